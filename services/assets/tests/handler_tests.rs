#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Handler tests for the asset service
//!
//! Drives the full axum router against an in-process ledger.

use assets_service::{create_router, handlers::AppState};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use fabric::{
    AssetRecord, AssetRouter, Enrollment, GatewayOptions, Identity, InMemoryLedger, Session,
    crypto,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn identity() -> Identity {
    let key_pair = crypto::generate_key_pair().unwrap();
    let certificate = crypto::self_signed_certificate("appUser", &key_pair).unwrap();
    Identity::new(
        "appUser",
        Enrollment {
            certificate,
            private_key: key_pair.serialize_pem(),
        },
        "Org1MSP",
    )
}

fn create_test_app(ledger: Arc<InMemoryLedger>) -> (Router, Arc<Session>) {
    let session = Arc::new(
        Session::new(&identity(), ledger, GatewayOptions::default(), None).unwrap(),
    );
    let contract = session.resolve_contract("mychannel", "basic").unwrap();
    let state = Arc::new(AppState {
        router: AssetRouter::new(contract),
        session: session.clone(),
    });
    (create_router(state), session)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header(header::CONTENT_TYPE, "application/json");
    }
    let request = request
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

fn error_of(body: &[u8]) -> String {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap();
    value["Error"].as_str().unwrap().to_string()
}

const ASSET1: &str =
    r#"{"ID":"asset1","Color":"blue","Size":5,"Owner":"Tom","AppraisedValue":300}"#;

// ==================== Health Check Tests ====================

#[tokio::test]
async fn test_health_and_index() {
    let (app, _session) = create_test_app(Arc::new(InMemoryLedger::new()));

    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_empty());
}

// ==================== Asset Lifecycle Tests ====================

#[tokio::test]
async fn test_create_and_read_asset() {
    let (app, _session) = create_test_app(Arc::new(InMemoryLedger::new()));

    let (status, _) = send(&app, "POST", "/createAsset", Some(ASSET1)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/readAsset/asset1", None).await;
    assert_eq!(status, StatusCode::OK);
    let asset: AssetRecord = serde_json::from_slice(&body).unwrap();
    assert_eq!(asset.id, "asset1");
    assert_eq!(asset.color, "blue");
    assert_eq!(asset.size, 5);
    assert_eq!(asset.owner, "Tom");
    assert_eq!(asset.appraised_value, 300);
}

#[tokio::test]
async fn test_update_uses_path_id() {
    let ledger = Arc::new(InMemoryLedger::new());
    let (app, _session) = create_test_app(ledger.clone());
    send(&app, "POST", "/createAsset", Some(ASSET1)).await;

    let (status, _) = send(
        &app,
        "POST",
        "/updateAsset/asset1",
        Some(r#"{"Color":"red","Size":"8","Owner":"Ann","AppraisedValue":450}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let assets = ledger.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].id, "asset1");
    assert_eq!(assets[0].color, "red");
    assert_eq!(assets[0].size, 8);
}

#[tokio::test]
async fn test_delete_then_read_is_not_found() {
    let (app, _session) = create_test_app(Arc::new(InMemoryLedger::new()));
    send(&app, "POST", "/createAsset", Some(ASSET1)).await;

    let (status, _) = send(&app, "DELETE", "/deleteAsset/asset1", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/readAsset/asset1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_of(&body), "the asset asset1 does not exist");
}

#[tokio::test]
async fn test_get_all_assets() {
    let (app, _session) = create_test_app(Arc::new(InMemoryLedger::new()));

    let (status, body) = send(&app, "GET", "/getAllAssets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"[]");

    for id in ["a", "b", "c"] {
        let asset = format!(
            r#"{{"ID":"{}","Color":"blue","Size":1,"Owner":"Tom","AppraisedValue":1}}"#,
            id
        );
        let (status, _) = send(&app, "POST", "/createAsset", Some(&asset)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, "GET", "/getAllAssets", None).await;
    let assets: Vec<AssetRecord> = serde_json::from_slice(&body).unwrap();
    let ids: Vec<&str> = assets.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_transfer_accepts_get_and_post() {
    let ledger = Arc::new(InMemoryLedger::new());
    let (app, _session) = create_test_app(ledger.clone());
    send(&app, "POST", "/createAsset", Some(ASSET1)).await;

    let (status, body) = send(
        &app,
        "GET",
        "/transferAsset",
        Some(r#"{"ID":"asset1","Owner":"Jerry"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Tom");
    assert_eq!(ledger.assets()[0].owner, "Jerry");

    let (status, _) = send(
        &app,
        "POST",
        "/transferAsset",
        Some(r#"{"ID":"asset1","Owner":"Spike"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.assets()[0].owner, "Spike");
}

async fn content_type(app: &Router, method: &str, uri: &str, body: Option<&str>) -> String {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header(header::CONTENT_TYPE, "application/json");
    }
    let request = request
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_content_type_follows_operation() {
    let (app, _session) = create_test_app(Arc::new(InMemoryLedger::new()));
    // An owner that happens to parse as JSON must still come back as text
    let asset = r#"{"ID":"asset1","Color":"blue","Size":5,"Owner":"42","AppraisedValue":300}"#;

    assert_eq!(
        content_type(&app, "POST", "/createAsset", Some(asset)).await,
        "application/json"
    );
    assert_eq!(
        content_type(&app, "GET", "/readAsset/asset1", None).await,
        "application/json"
    );
    assert_eq!(
        content_type(&app, "GET", "/getAllAssets", None).await,
        "application/json"
    );
    assert_eq!(
        content_type(
            &app,
            "POST",
            "/transferAsset",
            Some(r#"{"ID":"asset1","Owner":"Jerry"}"#)
        )
        .await,
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        content_type(
            &app,
            "POST",
            "/updateAsset/asset1",
            Some(r#"{"Color":"red","Size":8,"Owner":"Ann","AppraisedValue":450}"#)
        )
        .await,
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        content_type(&app, "DELETE", "/deleteAsset/asset1", None).await,
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        content_type(&app, "GET", "/readAsset/asset1", None).await,
        "application/json"
    );
}

// ==================== Error Mapping Tests ====================

#[tokio::test]
async fn test_duplicate_create_is_conflict() {
    let (app, _session) = create_test_app(Arc::new(InMemoryLedger::new()));
    send(&app, "POST", "/createAsset", Some(ASSET1)).await;

    let (status, body) = send(&app, "POST", "/createAsset", Some(ASSET1)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_of(&body), "the asset asset1 already exists");
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_requests() {
    let ledger = Arc::new(InMemoryLedger::new());
    let (app, _session) = create_test_app(ledger.clone());

    let (status, body) = send(&app, "POST", "/createAsset", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_of(&body).starts_with("Invalid JSON body"));

    let (status, _) = send(&app, "POST", "/createAsset", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/createAsset",
        Some(r#"{"ID":"asset1","Color":"blue","Size":"big","Owner":"Tom","AppraisedValue":1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(ledger.committed(), 0);
}

#[tokio::test]
async fn test_endorsement_failure_is_unavailable_and_recoverable() {
    let ledger = Arc::new(InMemoryLedger::new());
    let (app, _session) = create_test_app(ledger.clone());

    ledger.fail_endorsements(Some("endorsement policy failure"));
    let (status, body) = send(&app, "POST", "/createAsset", Some(ASSET1)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_of(&body), "endorsement policy failure");

    ledger.fail_endorsements(None);
    let (status, _) = send(&app, "POST", "/createAsset", Some(ASSET1)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_closed_session_is_unavailable() {
    let (app, session) = create_test_app(Arc::new(InMemoryLedger::new()));
    session.close().await;

    let (status, body) = send(&app, "GET", "/getAllAssets", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_of(&body), "Gateway session is closed");
}

#[tokio::test]
async fn test_cors_headers_present() {
    let (app, _session) = create_test_app(Arc::new(InMemoryLedger::new()));

    let request = Request::builder()
        .method("GET")
        .uri("/getAllAssets")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
