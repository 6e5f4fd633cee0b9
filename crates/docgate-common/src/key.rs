//! Mapping between virtual file-manager paths and backend object keys.
//!
//! Every key the gateway hands to a backend is produced here, so every key
//! lives under the configured root prefix.

use std::fmt;

use crate::error::{GatewayError, Result};

pub const DEFAULT_ROOT_FOLDER: &str = "Files";
pub const DELIMITER: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory keys end with the delimiter.
    pub fn is_directory(&self) -> bool {
        self.0.ends_with(DELIMITER)
    }

    /// Last path segment without the trailing delimiter.
    pub fn name(&self) -> &str {
        let trimmed = self.0.trim_end_matches(DELIMITER);
        trimmed.rsplit(DELIMITER).next().unwrap_or(trimmed)
    }

    /// Appends a relative key below this directory key.
    pub fn join(&self, relative: &str) -> Result<ObjectKey> {
        if !self.is_directory() {
            return Err(GatewayError::InvalidPath(format!(
                "{} is not a directory",
                self.name()
            )));
        }
        let is_directory = relative.ends_with(DELIMITER);
        let segments = split_path(relative)?;
        if segments.is_empty() {
            return Ok(self.clone());
        }
        let mut key = format!("{}{}", self.0, segments.join("/"));
        if is_directory {
            key.push(DELIMITER);
        }
        Ok(ObjectKey(key))
    }

    /// Portion of this key below `dir`, if it is contained in it.
    pub fn relative_to(&self, dir: &ObjectKey) -> Option<&str> {
        if !dir.is_directory() {
            return None;
        }
        self.0.strip_prefix(dir.as_str())
    }

    /// Whether this key is `dir` itself or lives anywhere below it.
    pub fn is_within(&self, dir: &ObjectKey) -> bool {
        dir.is_directory() && self.0.starts_with(dir.as_str())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct KeyMapper {
    root: String,
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT_FOLDER.to_string(),
        }
    }
}

impl KeyMapper {
    pub fn new(root: &str) -> Result<Self> {
        let segments = split_path(root)?;
        if segments.is_empty() {
            return Err(GatewayError::InvalidPath(
                "root folder must not be empty".to_string(),
            ));
        }
        Ok(Self {
            root: segments.join("/"),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn root_directory(&self) -> ObjectKey {
        ObjectKey(format!("{}{DELIMITER}", self.root))
    }

    /// Key prefix of a virtual directory, e.g. `/Reports/2024/` → `Files/Reports/2024/`.
    pub fn directory(&self, path: &str) -> Result<ObjectKey> {
        self.root_directory().join(&format!("{}/", split_path(path)?.join("/")))
    }

    /// Key of a file named `name` inside the virtual directory `path`.
    pub fn file(&self, path: &str, name: &str) -> Result<ObjectKey> {
        let name = validate_name(name)?;
        self.directory(path)?.join(name)
    }

    /// Key prefix of a sub-directory named `name` inside `path`.
    pub fn subdirectory(&self, path: &str, name: &str) -> Result<ObjectKey> {
        let name = validate_name(name)?;
        self.directory(path)?.join(&format!("{name}/"))
    }

    /// Key of a whole document addressed by name, e.g. `report.pdf` → `Files/report.pdf`.
    pub fn document(&self, document_name: &str) -> Result<ObjectKey> {
        let segments = split_path(document_name)?;
        if segments.is_empty() {
            return Err(GatewayError::MissingField("documentName"));
        }
        if document_name.ends_with(DELIMITER) {
            return Err(GatewayError::InvalidPath(document_name.to_string()));
        }
        self.root_directory().join(&segments.join("/"))
    }

    /// Accepts a key reported by the backend if it lies under the root prefix.
    pub fn adopt(&self, raw: &str) -> Option<ObjectKey> {
        let root = self.root_directory();
        let relative = raw.strip_prefix(root.as_str())?;
        root.join(relative).ok().filter(|key| key.as_str() == raw)
    }

    /// Virtual path of a key, e.g. `Files/Reports/q1.pdf` → `/Reports/q1.pdf`.
    pub fn virtual_path(&self, key: &ObjectKey) -> String {
        let relative = key.relative_to(&self.root_directory()).unwrap_or_default();
        format!("/{relative}")
    }

    /// Virtual path of the directory containing `key`, always ending in `/`.
    pub fn parent_path(&self, key: &ObjectKey) -> String {
        let path = self.virtual_path(key);
        let trimmed = path.trim_end_matches(DELIMITER);
        match trimmed.rfind(DELIMITER) {
            Some(idx) => trimmed[..=idx].to_string(),
            None => "/".to_string(),
        }
    }
}

/// Splits a virtual path into its segments, rejecting traversal attempts.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    path.split(DELIMITER)
        .filter(|segment| !segment.is_empty())
        .map(validate_segment)
        .collect()
}

/// Validates a single item name: one non-empty segment.
pub fn validate_name(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(GatewayError::MissingField("name"));
    }
    if name.contains(DELIMITER) {
        return Err(GatewayError::InvalidPath(name.to_string()));
    }
    validate_segment(name)
}

fn validate_segment(segment: &str) -> Result<&str> {
    if segment == "." || segment == ".." || segment.contains('\\') || segment.contains('\0') {
        return Err(GatewayError::InvalidPath(segment.to_string()));
    }
    Ok(segment)
}
