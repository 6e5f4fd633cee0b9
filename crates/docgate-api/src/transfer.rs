//! Streaming downloads, document fetches and uploads.
//!
//! Object bytes never sit in memory as a whole: reads are pumped through a
//! bounded channel by a spawned task, writes are fed to the backend while the
//! multipart body is still arriving.

use std::time::Duration;

use axum::body::Body;
use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use docgate_common::error::{BackendError, BackendResult, GatewayError, Result};
use docgate_common::key::ObjectKey;
use docgate_common::types::ObjectMeta;
use docgate_storage::{ByteStream, DocumentStore, ObjectBody};
use futures::StreamExt;
use http::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LAST_MODIFIED,
};
use http::{HeaderMap, HeaderValue, StatusCode};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::action::DownloadRequest;
use crate::router::AppState;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const DOCUMENT_NAME_FIELD: &str = "documentName";
const FILE_FIELDS: [&str; 2] = ["data", "file"];

/// RFC 5987 `attr-char`.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub document_name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Streams one file of the file manager back as an attachment.
pub async fn download(state: &AppState, request: &DownloadRequest) -> Result<Response> {
    let name = match request.names.as_slice() {
        [] => return Err(GatewayError::MissingField("names")),
        [name] => name,
        _ => {
            return Err(GatewayError::InvalidArgument(
                "only one file can be downloaded at a time".to_string(),
            ));
        }
    };

    let keys = state.documents.keys();
    let key = keys.file(&request.path, name)?;
    let object = match open(&state.documents, &key, name).await {
        Err(GatewayError::NotFound(missing)) => {
            let folder = keys.subdirectory(&request.path, name)?;
            if state.documents.list(&folder, true).await.is_ok() {
                return Err(GatewayError::InvalidArgument(
                    "folders cannot be downloaded".to_string(),
                ));
            }
            return Err(GatewayError::NotFound(missing));
        }
        other => other?,
    };

    let content_type = object
        .meta
        .content_type
        .clone()
        .unwrap_or_else(|| OCTET_STREAM.to_string());
    debug!(key = %key, size = object.meta.size, "streaming download");
    Ok(streaming_response(state, object, &content_type, name))
}

/// Streams a whole document addressed by name with the registered document
/// content type.
pub async fn fetch(state: &AppState, document_name: &str, headers: &HeaderMap) -> Result<Response> {
    let key = state.documents.keys().document(document_name)?;
    let object = open(&state.documents, &key, document_name).await?;

    let if_none_match = headers.get(IF_NONE_MATCH).and_then(|value| value.to_str().ok());
    if let (Some(candidates), Some(etag)) = (if_none_match, object.meta.etag.as_deref())
        && etag_matches(candidates, etag)
    {
        debug!(key = %key, "document unchanged");
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        if let Ok(value) = HeaderValue::from_str(etag) {
            response.headers_mut().insert(ETAG, value);
        }
        return Ok(response);
    }

    let content_type = state.options.document_content_type.clone();
    Ok(streaming_response(state, object, &content_type, document_name))
}

/// Stores the file part of a multipart upload under its document name.
///
/// The `documentName` field must precede the file part. A file part that
/// arrives first is rejected before anything is written.
pub async fn upload(state: &AppState, mut multipart: Multipart) -> Result<UploadReceipt> {
    let mut document_name = String::new();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() == Some(DOCUMENT_NAME_FIELD) {
            document_name = field.text().await.map_err(malformed)?;
            continue;
        }
        let is_file = field.file_name().is_some()
            || field
                .name()
                .is_some_and(|name| FILE_FIELDS.contains(&name));
        if !is_file {
            continue;
        }

        if document_name.is_empty() {
            return Err(GatewayError::InvalidArgument(format!(
                "{DOCUMENT_NAME_FIELD} must precede the file part"
            )));
        }
        let key = state.documents.keys().document(&document_name)?;
        let content_type = field.content_type().map(str::to_string);
        let meta = store_field(state, &key, field, content_type.as_deref()).await?;
        info!(key = %key, size = meta.size, "document uploaded");
        return Ok(UploadReceipt {
            document_name,
            size: meta.size,
            etag: meta.etag,
        });
    }

    if document_name.is_empty() {
        return Err(GatewayError::MissingField(DOCUMENT_NAME_FIELD));
    }
    Err(GatewayError::InvalidArgument("no file provided".to_string()))
}

/// Forwards `body` through a bounded channel. Every chunk must arrive within
/// `chunk_deadline`; once the receiving side is gone the backend stream is
/// dropped.
pub fn pump(body: ByteStream, capacity: usize, chunk_deadline: Duration) -> Body {
    let (tx, rx) = mpsc::channel::<BackendResult<Bytes>>(capacity.max(1));
    tokio::spawn(async move {
        let mut body = body;
        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    debug!("client went away, stopping object stream");
                    break;
                }
                next = tokio::time::timeout(chunk_deadline, body.next()) => next,
            };
            let chunk = match next {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(_) => Err(BackendError::Timeout(chunk_deadline)),
            };
            let failed = chunk.is_err();
            if let Err(err) = &chunk {
                warn!(error = %err, "object stream failed mid-transfer");
            }
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });
    Body::from_stream(receiver_stream(rx))
}

fn receiver_stream(rx: mpsc::Receiver<BackendResult<Bytes>>) -> ByteStream {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed()
}

async fn open(documents: &DocumentStore, key: &ObjectKey, name: &str) -> Result<ObjectBody> {
    documents.open(key).await.map_err(|err| {
        if err.is_not_found() {
            GatewayError::NotFound(name.to_string())
        } else {
            GatewayError::Backend(err)
        }
    })
}

/// Feeds one multipart field to the backend. The write only commits once the
/// field has been read to its end.
async fn store_field(
    state: &AppState,
    key: &ObjectKey,
    mut field: Field<'_>,
    content_type: Option<&str>,
) -> Result<ObjectMeta> {
    let (tx, rx) = mpsc::channel::<BackendResult<Bytes>>(state.options.channel_capacity.max(1));
    let feed = async move {
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if tx.send(Ok(chunk)).await.is_err() {
                        return None;
                    }
                }
                Ok(None) => return None,
                Err(err) => {
                    let _ = tx.send(Err(BackendError::Stream(err.body_text()))).await;
                    return Some(err);
                }
            }
        }
    };

    let (interrupted, stored) = tokio::join!(
        feed,
        state.documents.write(key, receiver_stream(rx), content_type)
    );
    if let Some(err) = interrupted {
        return Err(malformed(err));
    }
    Ok(stored?)
}

fn streaming_response(state: &AppState, object: ObjectBody, content_type: &str, filename: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(content_type).unwrap_or(HeaderValue::from_static(OCTET_STREAM)),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(object.meta.size));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(filename)) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    if let Some(value) = object
        .meta
        .etag
        .as_deref()
        .and_then(|etag| HeaderValue::from_str(etag).ok())
    {
        headers.insert(ETAG, value);
    }
    let last_modified = object
        .meta
        .last_modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        headers.insert(LAST_MODIFIED, value);
    }

    let body = pump(
        object.body,
        state.options.channel_capacity,
        state.documents.deadline(),
    );
    (StatusCode::OK, headers, body).into_response()
}

/// `attachment` disposition with an ASCII fallback and the exact UTF-8 name.
pub fn content_disposition(filename: &str) -> String {
    let fallback = filename
        .chars()
        .map(|ch| {
            if ch.is_ascii() && !ch.is_ascii_control() && ch != '"' && ch != '\\' {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let encoded = utf8_percent_encode(filename, FILENAME_ENCODE_SET);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let etag = etag.trim_matches('"');
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.trim_start_matches("W/").trim_matches('"') == etag
    })
}

fn malformed(err: MultipartError) -> GatewayError {
    GatewayError::InvalidArgument(format!("malformed upload: {}", err.body_text()))
}
