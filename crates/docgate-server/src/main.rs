mod config;

use std::sync::Arc;

use clap::Parser;
use docgate_storage::{DocumentStore, MemoryObjectStore, ObjectStore, S3ObjectStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{BackendConfig, Cli};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("docgate=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Cli::parse().into_config()?;
    let store: Arc<dyn ObjectStore> = match config.backend {
        BackendConfig::S3(s3) => {
            info!(bucket = %s3.bucket, region = %s3.region, "using s3 backend");
            Arc::new(S3ObjectStore::new(s3)?)
        }
        BackendConfig::Memory => {
            warn!("using in-memory backend, documents are lost on shutdown");
            Arc::new(MemoryObjectStore::new())
        }
    };

    let documents = DocumentStore::new(store, config.keys, config.deadline);
    if let Err(err) = documents.ping().await {
        warn!(error = %err, "backend not reachable yet");
    }

    let app = docgate_api::gateway_router(documents, config.options);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!("docgate listening on {}", config.addr);
    axum::serve(listener, app).await?;

    Ok(())
}
