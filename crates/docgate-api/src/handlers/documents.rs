use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::action::{DocumentRequest, DownloadRequest};
use crate::error::ApiError;
use crate::router::AppState;
use crate::transfer;

type ApiResult = std::result::Result<Response, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadForm {
    download_input: String,
}

/// Accepts the download selection as a JSON body or as the JSON string in
/// the `downloadInput` form field posted by browser file managers.
pub async fn download(State(state): State<AppState>, request: Request) -> ApiResult {
    let input = if is_json(request.headers()) {
        let Json(input) = Json::<DownloadRequest>::from_request(request, &state)
            .await
            .map_err(ApiError::malformed)?;
        input
    } else {
        let Form(form) = Form::<DownloadForm>::from_request(request, &state)
            .await
            .map_err(ApiError::malformed)?;
        serde_json::from_str::<DownloadRequest>(&form.download_input)
            .map_err(ApiError::malformed)?
    };

    transfer::download(&state, &input)
        .await
        .map_err(|err| ApiError::logged("download", err))
}

pub async fn fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DocumentRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload.map_err(ApiError::malformed)?;
    transfer::fetch(&state, &request.document_name, &headers)
        .await
        .map_err(|err| ApiError::logged("fetch", err))
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let multipart = multipart.map_err(ApiError::malformed)?;
    let receipt = transfer::upload(&state, multipart)
        .await
        .map_err(|err| ApiError::logged("upload", err))?;
    Ok(Json(receipt).into_response())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with("application/json"))
}
