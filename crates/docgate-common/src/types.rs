use chrono::{DateTime, Utc};

/// Object metadata as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// One page-free listing: objects directly under a prefix plus the common
/// prefixes when a delimiter was given.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub objects: Vec<ObjectMeta>,
    pub prefixes: Vec<String>,
}

/// Item descriptor of the directory action protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub is_file: bool,
    pub size: u64,
    pub date_modified: DateTime<Utc>,
    pub date_created: DateTime<Utc>,
    pub has_child: bool,
    pub file_type: String,
    pub filter_path: String,
}

impl FileEntry {
    pub fn file(name: impl Into<String>, filter_path: impl Into<String>, meta: &ObjectMeta) -> Self {
        let name = name.into();
        Self {
            file_type: extension_of(&name),
            name,
            is_file: true,
            size: meta.size,
            date_modified: meta.last_modified,
            date_created: meta.last_modified,
            has_child: false,
            filter_path: filter_path.into(),
        }
    }

    pub fn directory(
        name: impl Into<String>,
        filter_path: impl Into<String>,
        modified: DateTime<Utc>,
        has_child: bool,
    ) -> Self {
        Self {
            name: name.into(),
            is_file: false,
            size: 0,
            date_modified: modified,
            date_created: modified,
            has_child,
            file_type: String::new(),
            filter_path: filter_path.into(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDetails {
    pub name: String,
    pub location: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub is_file: bool,
    pub multiple_files: bool,
}

/// Extension including the leading dot, or empty when there is none.
pub fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::extension_of;

    #[test]
    fn extension_keeps_the_dot() {
        assert_eq!(extension_of("report.final.pdf"), ".pdf");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".hidden"), "");
    }
}
