use std::time::Duration;

use thiserror::Error;

/// Uniform failure signal of every object store backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("object not found: {key}")]
    NotFound { key: String },
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend returned status {status} ({code}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error("failed to delete {failed} of {total} objects")]
    PartialDelete { failed: usize, total: usize },
    #[error("transfer stream failed: {0}")]
    Stream(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caused by the request itself; never logged as a server fault.
    Validation,
    NotFound,
    Backend,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("restricted to modify the root folder")]
    RootProtection,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("a file or folder with the name {0} already exists")]
    AlreadyExists(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAction(_)
            | Self::RootProtection
            | Self::MissingField(_)
            | Self::InvalidPath(_)
            | Self::InvalidArgument(_)
            | Self::AlreadyExists(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Backend => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "400",
            ErrorKind::NotFound => "404",
            ErrorKind::Backend => "500",
        }
    }

    /// Message that is safe to hand to the caller. Backend causes stay internal.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => self.to_string(),
            ErrorKind::NotFound => "File not found".to_string(),
            ErrorKind::Backend => "Operation failed".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
