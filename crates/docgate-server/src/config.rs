use std::time::Duration;

use clap::{Parser, ValueEnum};
use docgate_api::GatewayOptions;
use docgate_api::router::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_DOCUMENT_CONTENT_TYPE, DEFAULT_MAX_UPLOAD_BYTES,
};
use docgate_common::key::{DEFAULT_ROOT_FOLDER, KeyMapper};
use docgate_storage::S3Config;
use docgate_storage::s3::DEFAULT_REGION;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    S3,
    /// Process-local store, contents are lost on exit.
    Memory,
}

#[derive(Debug, Parser)]
#[command(name = "docgate", about = "Document storage gateway for browser file managers")]
pub struct Cli {
    #[arg(long, env = "DOCGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "DOCGATE_PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "DOCGATE_BACKEND", value_enum, default_value_t = BackendKind::S3)]
    pub backend: BackendKind,

    #[arg(long, env = "DOCGATE_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    #[arg(long, env = "DOCGATE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, env = "DOCGATE_BUCKET")]
    pub bucket: Option<String>,

    #[arg(long, env = "DOCGATE_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Endpoint of an S3-compatible store, e.g. `http://127.0.0.1:9000`.
    #[arg(long, env = "DOCGATE_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, env = "DOCGATE_ROOT_FOLDER", default_value = DEFAULT_ROOT_FOLDER)]
    pub root_folder: String,

    #[arg(long, env = "DOCGATE_BACKEND_TIMEOUT_SECS", default_value_t = 30)]
    pub backend_timeout_secs: u64,

    #[arg(long, env = "DOCGATE_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "DOCGATE_CHANNEL_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    #[arg(
        long,
        env = "DOCGATE_DOCUMENT_CONTENT_TYPE",
        default_value = DEFAULT_DOCUMENT_CONTENT_TYPE
    )]
    pub document_content_type: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--{0} is required for the s3 backend")]
    Missing(&'static str),
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug)]
pub enum BackendConfig {
    S3(S3Config),
    Memory,
}

/// Validated settings, read once at startup.
#[derive(Debug)]
pub struct GatewayConfig {
    pub addr: String,
    pub backend: BackendConfig,
    pub keys: KeyMapper,
    pub deadline: Duration,
    pub options: GatewayOptions,
}

impl Cli {
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        if self.backend_timeout_secs == 0 {
            return Err(invalid("backend timeout", "must be at least one second"));
        }
        if self.channel_capacity == 0 {
            return Err(invalid("channel capacity", "must be at least one chunk"));
        }
        if self.max_upload_bytes == 0 {
            return Err(invalid("max upload bytes", "must be positive"));
        }
        if self.document_content_type.trim().is_empty() {
            return Err(invalid("document content type", "must not be empty"));
        }

        let keys = KeyMapper::new(&self.root_folder)
            .map_err(|err| invalid("root folder", &err.to_string()))?;
        let deadline = Duration::from_secs(self.backend_timeout_secs);
        let backend = match self.backend {
            BackendKind::Memory => BackendConfig::Memory,
            BackendKind::S3 => BackendConfig::S3(S3Config {
                endpoint: self.endpoint.filter(|endpoint| !endpoint.trim().is_empty()),
                region: self.region,
                bucket: required(self.bucket, "bucket")?,
                access_key: required(self.access_key, "access-key")?,
                secret_key: required(self.secret_key, "secret-key")?,
                request_timeout: deadline,
            }),
        };

        Ok(GatewayConfig {
            addr: format!("{}:{}", self.host, self.port),
            backend,
            keys,
            deadline,
            options: GatewayOptions {
                max_upload_bytes: self.max_upload_bytes,
                channel_capacity: self.channel_capacity,
                document_content_type: self.document_content_type,
            },
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}
