//! Health and metrics endpoint tests.

mod common;

use axum::body::Bytes;
use axum::http::StatusCode;
use common::{png_bytes, spawn_app};
use serde_json::Value;

#[tokio::test]
async fn test_health_reports_version() {
    let app = spawn_app().await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_liveness() {
    let app = spawn_app().await;
    app.server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn test_readiness_checks_record_store_and_storage() {
    let app = spawn_app().await;

    let response = app.server.get("/health/ready").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ready"], true);
    let names: Vec<&str> = body["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["record_store", "storage"]);
}

#[tokio::test]
async fn test_readiness_fails_when_database_is_closed() {
    let app = spawn_app().await;
    app.db.close().await;

    let response = app.server.get("/health/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["ready"], false);
    assert_eq!(body["checks"][0]["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_count_uploads() {
    let app = spawn_app().await;
    app.server
        .post("/attachments/ws1/store1/7/photos")
        .content_type("image/png")
        .bytes(Bytes::from(png_bytes()))
        .await
        .assert_status(StatusCode::CREATED);

    let response = app.server.get("/metrics").await;
    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("annex_uploads_total 1"), "{}", text);
    assert!(text.contains("annex_link_sync_failures_total 0"));
}
