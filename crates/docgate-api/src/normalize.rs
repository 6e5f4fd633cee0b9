//! Wire shape of directory action results.

use chrono::{DateTime, SecondsFormat, Utc};
use docgate_common::error::GatewayError;
use docgate_common::types::{FileEntry, ItemDetails};
use docgate_storage::{DirectoryListing, TransferReport};
use http::StatusCode;
use serde::Serialize;

const CONFLICT_CODE: &str = "400";
const CONFLICT_MESSAGE: &str = "File Already Exists";
const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// What the adapter produced for one action.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Listing(DirectoryListing),
    Files(Vec<FileEntry>),
    Transfer(TransferReport),
    Details(ItemDetails),
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<FileEntryBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntryBody>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<DetailsBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntryBody {
    pub name: String,
    pub is_file: bool,
    pub size: u64,
    pub date_modified: String,
    pub date_created: String,
    pub has_child: bool,
    #[serde(rename = "type")]
    pub file_type: String,
    pub filter_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsBody {
    pub name: String,
    pub location: String,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub is_file: bool,
    pub multiple_files: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_exists: Option<Vec<String>>,
}

impl From<&FileEntry> for FileEntryBody {
    fn from(entry: &FileEntry) -> Self {
        Self {
            name: entry.name.clone(),
            is_file: entry.is_file,
            size: entry.size,
            date_modified: format_date(&entry.date_modified),
            date_created: format_date(&entry.date_created),
            has_child: entry.has_child,
            file_type: entry.file_type.clone(),
            filter_path: entry.filter_path.clone(),
        }
    }
}

impl From<&ItemDetails> for DetailsBody {
    fn from(details: &ItemDetails) -> Self {
        Self {
            name: details.name.clone(),
            location: details.location.clone(),
            size: format_size(details.size),
            modified: details.modified.as_ref().map(format_date),
            created: details.created.as_ref().map(format_date),
            is_file: details.is_file,
            multiple_files: details.multiple_files,
        }
    }
}

impl ErrorBody {
    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.public_message(),
            file_exists: None,
        }
    }
}

/// Maps a successful outcome to its status and body. Copy and move conflicts
/// still answer `200` so the client sees both the written files and the
/// skipped names.
pub fn success(outcome: &ActionOutcome) -> (StatusCode, ActionResponse) {
    let response = match outcome {
        ActionOutcome::Listing(listing) => ActionResponse {
            cwd: Some(FileEntryBody::from(&listing.cwd)),
            files: Some(entries(&listing.files)),
            ..Default::default()
        },
        ActionOutcome::Files(files) => ActionResponse {
            files: Some(entries(files)),
            ..Default::default()
        },
        ActionOutcome::Transfer(report) => ActionResponse {
            files: Some(entries(&report.files)),
            error: (!report.conflicts.is_empty()).then(|| ErrorBody {
                code: CONFLICT_CODE.to_string(),
                message: CONFLICT_MESSAGE.to_string(),
                file_exists: Some(report.conflicts.clone()),
            }),
            ..Default::default()
        },
        ActionOutcome::Details(details) => ActionResponse {
            details: Some(DetailsBody::from(details)),
            ..Default::default()
        },
    };
    (StatusCode::OK, response)
}

pub fn failure(err: &GatewayError) -> (StatusCode, ActionResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let response = ActionResponse {
        error: Some(ErrorBody::from_error(err)),
        ..Default::default()
    };
    (status, response)
}

/// Human-readable byte count, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", SIZE_UNITS[unit])
}

fn entries(files: &[FileEntry]) -> Vec<FileEntryBody> {
    files.iter().map(FileEntryBody::from).collect()
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}
