use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use docgate_storage::DocumentStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;
pub const DEFAULT_DOCUMENT_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub max_upload_bytes: usize,
    /// Chunks buffered between a backend read and the client.
    pub channel_capacity: usize,
    /// Content type served by `/documents/fetch`.
    pub document_content_type: String,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            document_content_type: DEFAULT_DOCUMENT_CONTENT_TYPE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentStore,
    pub options: Arc<GatewayOptions>,
}

pub fn gateway_router(documents: DocumentStore, options: GatewayOptions) -> Router {
    let body_limit = DefaultBodyLimit::max(options.max_upload_bytes);
    let state = AppState {
        documents,
        options: Arc::new(options),
    };

    Router::<AppState>::new()
        .route(
            "/documents/actions",
            post(handlers::actions::directory_action),
        )
        .route("/documents/download", post(handlers::documents::download))
        .route("/documents/fetch", post(handlers::documents::fetch))
        .route("/documents/upload", post(handlers::documents::upload))
        .route("/health/live", get(handlers::health::health_live))
        .route("/health/ready", get(handlers::health::health_ready))
        .layer(body_limit)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
