//! HttpAnalysisClient against an in-process mock of the analysis service

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analysis_client::{AnalysisApi, AnalysisError, ClientConfig, HttpAnalysisClient, RetryPolicy};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Behaviour knobs and call log for the mock service
#[derive(Default)]
struct Mock {
    calls: AtomicUsize,
    /// Number of leading calls answered with 503
    fail_first: AtomicUsize,
    /// Status used for every answer when set (after `fail_first` runs out)
    forced_status: Mutex<Option<StatusCode>>,
    uploads: Mutex<Vec<(String, usize)>>,
    auth_headers: Mutex<Vec<Option<String>>>,
}

type Shared = Arc<Mock>;

impl Mock {
    /// Record the call and decide whether to fail it
    fn begin(&self, headers: &HeaderMap) -> Option<StatusCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.auth_headers.lock().unwrap().push(
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );

        let pending = self.fail_first.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_first.store(pending - 1, Ordering::SeqCst);
            return Some(StatusCode::SERVICE_UNAVAILABLE);
        }
        *self.forced_status.lock().unwrap()
    }
}

fn failure(status: StatusCode) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": format!("mock failure {}", status.as_u16()) })))
}

async fn upload_doc(
    State(mock): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    if let Some(status) = mock.begin(&headers) {
        return failure(status);
    }
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("").to_string();
            let bytes = field.bytes().await.unwrap_or_default();
            mock.uploads.lock().unwrap().push((name, bytes.len()));
        }
    }
    (StatusCode::OK, Json(json!({ "id": 77 })))
}

async fn doc_analyse(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if let Some(status) = mock.begin(&headers) {
        return failure(status);
    }
    (StatusCode::OK, Json(json!({ "document_id": params.get("document_id") })))
}

async fn get_text(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    if let Some(status) = mock.begin(&headers) {
        return failure(status);
    }
    if id == 0 {
        return (StatusCode::OK, Json(json!({})));
    }
    (StatusCode::OK, Json(json!({ "text": format!("text of {}", id) })))
}

async fn delete_doc(
    State(mock): State<Shared>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Some(status) = mock.begin(&headers) {
        return failure(status);
    }
    (StatusCode::OK, Json(json!({ "deleted": true })))
}

async fn spawn_mock() -> (SocketAddr, Shared) {
    let mock: Shared = Arc::new(Mock::default());
    let app = Router::new()
        .route("/upload_doc", post(upload_doc))
        .route("/doc_analyse", post(doc_analyse))
        .route("/get_text/:id", get(get_text))
        .route("/delete_doc", delete(delete_doc))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(5),
    }
}

fn client_for(addr: SocketAddr, retry: RetryPolicy) -> HttpAnalysisClient {
    let config = ClientConfig::new(format!("http://{}", addr))
        .with_timeout(Duration::from_secs(5))
        .with_retry(retry);
    HttpAnalysisClient::new(config).unwrap()
}

#[tokio::test]
async fn test_upload_returns_remote_id() {
    let (addr, mock) = spawn_mock().await;
    let client = client_for(addr, fast_retry(0));

    let id = client
        .upload_document("scan.pdf", vec![1u8; 2048])
        .await
        .unwrap();

    assert_eq!(id, 77);
    assert_eq!(
        mock.uploads.lock().unwrap().clone(),
        vec![("scan.pdf".to_string(), 2048)]
    );
}

#[tokio::test]
async fn test_analyze_success_and_failure() {
    let (addr, mock) = spawn_mock().await;
    let client = client_for(addr, fast_retry(0));

    client.analyze_document(5).await.unwrap();

    *mock.forced_status.lock().unwrap() = Some(StatusCode::BAD_REQUEST);
    let err = client.analyze_document(5).await.unwrap_err();
    match err {
        AnalysisError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "mock failure 400");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_text() {
    let (addr, _mock) = spawn_mock().await;
    let client = client_for(addr, fast_retry(0));

    assert_eq!(
        client.fetch_text(9).await.unwrap(),
        Some("text of 9".to_string())
    );
    assert_eq!(client.fetch_text(0).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_document() {
    let (addr, mock) = spawn_mock().await;
    let client = client_for(addr, fast_retry(0));

    client.delete_document(3).await.unwrap();
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_failures_are_retried_within_bound() {
    let (addr, mock) = spawn_mock().await;
    let client = client_for(addr, fast_retry(2));

    mock.fail_first.store(2, Ordering::SeqCst);
    client.analyze_document(1).await.unwrap();
    assert_eq!(mock.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_gives_up_after_bound() {
    let (addr, mock) = spawn_mock().await;
    let client = client_for(addr, fast_retry(2));

    mock.fail_first.store(10, Ordering::SeqCst);
    let err = client.delete_document(1).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (addr, mock) = spawn_mock().await;
    let client = client_for(addr, fast_retry(3));

    *mock.forced_status.lock().unwrap() = Some(StatusCode::NOT_FOUND);
    assert!(client.fetch_text(4).await.is_err());
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_upload_is_not_retried_on_server_error() {
    let (addr, mock) = spawn_mock().await;
    let client = client_for(addr, fast_retry(3));

    mock.fail_first.store(1, Ordering::SeqCst);
    let err = client.upload_document("a.png", vec![0u8; 10]).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    assert!(mock.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_reported() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, fast_retry(1));
    let err = client.analyze_document(1).await.unwrap_err();
    assert!(
        matches!(err, AnalysisError::Connection { .. }),
        "expected connection error, got {:?}",
        err
    );
}

#[tokio::test]
async fn test_bearer_token_header_and_proxy_routing() {
    let (addr, mock) = spawn_mock().await;
    let config = ClientConfig::new("http://127.0.0.1:9")
        .with_bearer("s3cret", Some(format!("http://{}/", addr)))
        .with_retry(fast_retry(0));
    let client = HttpAnalysisClient::new(config).unwrap();

    assert_eq!(client.base_url(), format!("http://{}", addr));
    client.analyze_document(2).await.unwrap();

    assert_eq!(
        mock.auth_headers.lock().unwrap().clone(),
        vec![Some("Bearer s3cret".to_string())]
    );
}
