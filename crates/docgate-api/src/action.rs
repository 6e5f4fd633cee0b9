use std::fmt;
use std::str::FromStr;

use docgate_common::error::GatewayError;
use serde::{Deserialize, Deserializer};

/// The file-manager protocol actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Delete,
    Copy,
    Move,
    Rename,
    Details,
    Create,
    Search,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Delete => "delete",
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Rename => "rename",
            Self::Details => "details",
            Self::Create => "create",
            Self::Search => "search",
        }
    }

    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Delete | Self::Copy | Self::Move | Self::Rename | Self::Create
        )
    }
}

impl FromStr for Action {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Self::Read),
            "delete" => Ok(Self::Delete),
            "copy" => Ok(Self::Copy),
            "move" => Ok(Self::Move),
            "rename" => Ok(Self::Rename),
            "details" => Ok(Self::Details),
            "create" => Ok(Self::Create),
            "search" => Ok(Self::Search),
            _ => Err(GatewayError::InvalidAction(value.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /documents/actions`.
///
/// File-manager clients send `null` for fields they do not use, so every
/// field treats `null` like an absent value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectoryActionRequest {
    #[serde(deserialize_with = "nullable")]
    pub action: String,
    #[serde(deserialize_with = "nullable")]
    pub path: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub names: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub target_path: String,
    #[serde(deserialize_with = "nullable")]
    pub new_name: String,
    #[serde(deserialize_with = "nullable")]
    pub rename_files: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub search_string: String,
    #[serde(deserialize_with = "nullable")]
    pub case_sensitive: bool,
    #[serde(deserialize_with = "nullable")]
    pub show_hidden_items: bool,
    /// Item descriptors echoed by the client; not interpreted.
    pub data: serde_json::Value,
    pub target_data: serde_json::Value,
}

/// Body of `POST /documents/download`, or the JSON carried in its
/// `downloadInput` form field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadRequest {
    #[serde(deserialize_with = "nullable")]
    pub path: String,
    #[serde(deserialize_with = "nullable")]
    pub names: Vec<String>,
}

/// Body of `POST /documents/fetch`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentRequest {
    #[serde(deserialize_with = "nullable")]
    pub document_name: String,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
