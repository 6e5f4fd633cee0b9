/// Search pattern supporting `*` and `?` wildcards.
///
/// A term without wildcards matches anywhere in the name.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    pattern: Vec<char>,
    case_sensitive: bool,
}

impl SearchPattern {
    pub fn new(search: &str, case_sensitive: bool) -> Self {
        let search = if search.contains(['*', '?']) {
            search.to_string()
        } else {
            format!("*{search}*")
        };
        Self {
            pattern: fold(&search, case_sensitive),
            case_sensitive,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        wildcard_match(&self.pattern, &fold(name, self.case_sensitive))
    }
}

fn fold(value: &str, case_sensitive: bool) -> Vec<char> {
    if case_sensitive {
        value.chars().collect()
    } else {
        value.chars().flat_map(char::to_lowercase).collect()
    }
}

fn wildcard_match(pattern: &[char], input: &[char]) -> bool {
    let mut p = 0;
    let mut i = 0;
    let mut star_idx: Option<usize> = None;
    let mut match_idx = 0;

    while i < input.len() {
        if p < pattern.len() && (pattern[p] == input[i] || pattern[p] == '?') {
            p += 1;
            i += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star_idx = Some(p);
            match_idx = i;
            p += 1;
        } else if let Some(star) = star_idx {
            p = star + 1;
            match_idx += 1;
            i = match_idx;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}
