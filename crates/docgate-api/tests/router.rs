use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use bytes::Bytes;
use docgate_api::{GatewayOptions, gateway_router};
use docgate_common::KeyMapper;
use docgate_storage::adapter::DEFAULT_DEADLINE;
use docgate_storage::memory::Operation;
use docgate_storage::{DocumentStore, MemoryObjectStore};
use http::{HeaderMap, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "docgate-test-boundary";

fn app() -> (Arc<MemoryObjectStore>, Router) {
    let memory = Arc::new(MemoryObjectStore::new());
    let documents = DocumentStore::new(memory.clone(), KeyMapper::default(), DEFAULT_DEADLINE);
    (memory, gateway_router(documents, GatewayOptions::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn action(app: &Router, body: Value) -> (StatusCode, Value) {
    let (status, _, bytes) = send(app, json_request("/documents/actions", &body)).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn text_part(name: &str, value: &str) -> String {
    format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
}

fn file_part(data: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"data\"; filename=\"blob\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    part.extend_from_slice(data);
    part.extend_from_slice(b"\r\n");
    part
}

fn closing() -> String {
    format!("--{BOUNDARY}--\r\n")
}

async fn send_multipart(app: &Router, body: Vec<u8>) -> (StatusCode, Bytes) {
    let request = Request::builder()
        .method("POST")
        .uri("/documents/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, body)
}

async fn upload(app: &Router, document_name: &str, data: &[u8]) -> StatusCode {
    let mut body = text_part("documentName", document_name).into_bytes();
    body.extend_from_slice(&file_part(data));
    body.extend_from_slice(closing().as_bytes());
    send_multipart(app, body).await.0
}

async fn fetch(app: &Router, document_name: &str) -> (StatusCode, HeaderMap, Bytes) {
    send(
        app,
        json_request("/documents/fetch", &json!({ "documentName": document_name })),
    )
    .await
}

fn names(listing: &Value) -> Vec<String> {
    listing["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn uploaded_documents_fetch_back_unchanged() {
    let (_, app) = app();
    let data = b"%PDF-1.7 quarterly numbers";
    assert_eq!(upload(&app, "report.pdf", data).await, StatusCode::OK);

    let (status, headers, body) = fetch(&app, "report.pdf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], data);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert!(
        headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("filename=\"report.pdf\"")
    );
}

#[tokio::test]
async fn uploads_overwrite_previous_versions() {
    let (_, app) = app();
    upload(&app, "report.pdf", b"first").await;
    upload(&app, "report.pdf", b"second").await;

    let (_, _, body) = fetch(&app, "report.pdf").await;
    assert_eq!(&body[..], b"second");
}

#[tokio::test]
async fn unchanged_documents_answer_not_modified() {
    let (_, app) = app();
    upload(&app, "report.pdf", b"%PDF").await;
    let (_, headers, _) = fetch(&app, "report.pdf").await;
    let etag = headers[header::ETAG].to_str().unwrap().to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/documents/fetch")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::IF_NONE_MATCH, etag)
        .body(Body::from(json!({ "documentName": "report.pdf" }).to_string()))
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
}

#[tokio::test]
async fn fetch_reports_missing_names_and_documents() {
    let (_, app) = app();
    let (status, _, body) = fetch(&app, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["code"], "400");

    let (status, _, _) = fetch(&app, "ghost.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn root_folder_cannot_be_deleted_or_renamed() {
    let (memory, app) = app();
    for body in [
        json!({ "action": "delete", "path": "", "targetPath": "", "names": ["Files"] }),
        json!({ "action": "rename", "path": "", "name": "Files", "newName": "Other" }),
    ] {
        let (status, response) = action(&app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response["error"]["message"],
            "restricted to modify the root folder"
        );
    }
    assert_eq!(memory.call_count(), 0);
}

#[tokio::test]
async fn unknown_actions_are_rejected_without_backend_calls() {
    let (memory, app) = app();
    for name in ["format", "Read", " delete"] {
        let (status, response) = action(&app, json!({ "action": name, "path": "/" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], "400");
    }
    assert_eq!(memory.call_count(), 0);
}

#[tokio::test]
async fn created_and_deleted_folders_show_up_in_listings() {
    let (_, app) = app();
    let (status, created) = action(
        &app,
        json!({ "action": "create", "path": "/", "name": "Invoices" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["files"][0]["name"], "Invoices");

    let (_, listing) = action(&app, json!({ "action": "read", "path": "/" })).await;
    assert_eq!(listing["cwd"]["name"], "Files");
    assert!(names(&listing).contains(&"Invoices".to_string()));

    let (status, _) = action(
        &app,
        json!({ "action": "delete", "path": "/", "names": ["Invoices"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = action(&app, json!({ "action": "read", "path": "/" })).await;
    assert!(!names(&listing).contains(&"Invoices".to_string()));
}

#[tokio::test]
async fn moved_files_leave_their_source_folder() {
    let (_, app) = app();
    upload(&app, "a.pdf", b"a").await;
    action(&app, json!({ "action": "create", "path": "/", "name": "Archive" })).await;

    let (status, moved) = action(
        &app,
        json!({ "action": "move", "path": "/", "names": ["a.pdf"], "targetPath": "/Archive/" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["files"][0]["filterPath"], "/Archive/");

    let (_, root) = action(&app, json!({ "action": "read", "path": "/" })).await;
    assert!(!names(&root).contains(&"a.pdf".to_string()));
    let (_, archive) = action(&app, json!({ "action": "read", "path": "/Archive/" })).await;
    assert_eq!(names(&archive), vec!["a.pdf".to_string()]);
}

#[tokio::test]
async fn failed_move_cleanup_leaves_both_copies() {
    let (memory, app) = app();
    upload(&app, "a.pdf", b"a").await;
    action(&app, json!({ "action": "create", "path": "/", "name": "Archive" })).await;
    memory.fail(Operation::Delete);

    let (status, _) = action(
        &app,
        json!({ "action": "move", "path": "/", "names": ["a.pdf"], "targetPath": "/Archive/" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let keys = memory.keys();
    assert!(keys.contains(&"Files/a.pdf".to_string()));
    assert!(keys.contains(&"Files/Archive/a.pdf".to_string()));
}

#[tokio::test]
async fn copy_conflicts_are_listed_next_to_the_result() {
    let (_, app) = app();
    upload(&app, "a.pdf", b"new").await;
    upload(&app, "Archive/a.pdf", b"old").await;

    let (status, response) = action(
        &app,
        json!({ "action": "copy", "path": "/", "names": ["a.pdf"], "targetPath": "/Archive/" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["error"]["code"], "400");
    assert_eq!(response["error"]["fileExists"], json!(["a.pdf"]));

    let (_, _, body) = fetch(&app, "Archive/a.pdf").await;
    assert_eq!(&body[..], b"old");
}

#[tokio::test]
async fn downloads_accept_the_form_encoded_selection() {
    let (_, app) = app();
    upload(&app, "Reports/q1.pdf", b"q1 numbers").await;

    let selection = json!({ "path": "/Reports/", "names": ["q1.pdf"] }).to_string();
    let form = format!(
        "downloadInput={}",
        percent_encoding::utf8_percent_encode(&selection, percent_encoding::NON_ALPHANUMERIC)
    );
    let request = Request::builder()
        .method("POST")
        .uri("/documents/download")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"q1 numbers");
    assert!(
        headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"q1.pdf\"")
    );
}

#[tokio::test]
async fn folders_and_multiple_items_are_not_downloadable() {
    let (_, app) = app();
    upload(&app, "Reports/q1.pdf", b"q1").await;

    for selection in [
        json!({ "path": "/", "names": ["Reports"] }),
        json!({ "path": "/Reports/", "names": ["q1.pdf", "q2.pdf"] }),
    ] {
        let (status, _, _) = send(&app, json_request("/documents/download", &selection)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn backend_outages_stay_generic() {
    let (memory, app) = app();
    memory.fail(Operation::List);

    let (status, response) = action(&app, json!({ "action": "read", "path": "/" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response,
        json!({ "error": { "code": "500", "message": "Operation failed" } })
    );

    let request = Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    memory.clear_faults();
    let request = Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn file_part_before_document_name_is_rejected() {
    let (memory, app) = app();
    let mut body = file_part(b"%PDF");
    body.extend_from_slice(text_part("documentName", "report.pdf").as_bytes());
    body.extend_from_slice(closing().as_bytes());

    let (status, body) = send_multipart(&app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["code"], "400");
    assert!(memory.keys().is_empty());
}

#[tokio::test]
async fn upload_without_a_file_part_is_rejected() {
    let (memory, app) = app();
    let mut body = text_part("documentName", "report.pdf").into_bytes();
    body.extend_from_slice(closing().as_bytes());

    let (status, body) = send_multipart(&app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["code"], "400");
    assert!(memory.keys().is_empty());
}

#[tokio::test]
async fn upload_backend_failures_stay_generic() {
    let (memory, app) = app();
    memory.fail(Operation::Put);

    let mut body = text_part("documentName", "report.pdf").into_bytes();
    body.extend_from_slice(&file_part(b"%PDF"));
    body.extend_from_slice(closing().as_bytes());
    let (status, body) = send_multipart(&app, body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body,
        json!({ "error": { "code": "500", "message": "Operation failed" } })
    );
    assert!(memory.keys().is_empty());
}

#[tokio::test]
async fn fetch_backend_failures_stay_generic() {
    let (memory, app) = app();
    assert_eq!(upload(&app, "report.pdf", b"%PDF").await, StatusCode::OK);
    memory.fail(Operation::Get);

    let (status, _, body) = fetch(&app, "report.pdf").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body,
        json!({ "error": { "code": "500", "message": "Operation failed" } })
    );
}

#[tokio::test]
async fn truncated_upload_stores_nothing() {
    let (memory, app) = app();
    let mut body = text_part("documentName", "report.pdf").into_bytes();
    body.extend_from_slice(&file_part(b"%PDF-1.7 partial"));

    let (status, _) = send_multipart(&app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(memory.keys().is_empty());
}

#[tokio::test]
async fn details_without_names_describe_the_folder() {
    let (_, app) = app();
    assert_eq!(upload(&app, "Reports/q1.pdf", b"1234").await, StatusCode::OK);

    let (status, response) =
        action(&app, json!({ "action": "details", "path": "/Reports/", "names": [] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["details"]["name"], "Reports");
    assert_eq!(response["details"]["location"], "/Reports/");
    assert_eq!(response["details"]["isFile"], false);
}
