use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::warn;

use crate::router::AppState;

pub async fn health_live() -> impl IntoResponse {
    StatusCode::OK
}

/// Ready while the backend can list the root folder.
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.documents.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(err) => {
            warn!(error = %err, "backend readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
