use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};

use crate::action::DirectoryActionRequest;
use crate::dispatch;
use crate::error::ApiError;
use crate::router::AppState;

pub async fn directory_action(
    State(state): State<AppState>,
    payload: Result<Json<DirectoryActionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::malformed(rejection).into_response(),
    };

    let (status, body) = dispatch::handle(&state.documents, &request).await;
    (status, Json(body)).into_response()
}
