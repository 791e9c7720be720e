mod common;

use common::TestApp;
use reconciliation_service::services::init_metrics;

#[tokio::test]
async fn health_check_reports_active_jobs() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "reconciliation-service");
    assert_eq!(body["activeJobs"], 0);

    app.manager.create_job(Default::default());
    let body: serde_json::Value = app.get("/health").await.json().await.unwrap();
    assert_eq!(body["activeJobs"], 1);
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;
    assert!(app.get("/ready").await.status().is_success());
}

#[tokio::test]
async fn readiness_fails_when_spool_directory_cannot_be_created() {
    let blocker = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let spool = blocker.path().join("jobs");
    let app = TestApp::spawn_with(move |config| config.ingest.temp_dir = spool).await;

    let response = app.get("/ready").await;
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::spawn().await;
    let response = app
        .client
        .get(format!("{}/health", app.address))
        .header("x-request-id", "req-123")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn metrics_endpoint_returns_prometheus_format() {
    init_metrics().expect("Failed to initialize metrics");
    let app = TestApp::spawn().await;
    app.upload(common::MERCHANT_CSV.as_bytes(), None, None).await;

    let response = app.get("/metrics").await;
    assert!(response.status().is_success());
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = response.text().await.expect("Failed to get response body");
    assert!(body.contains("uploads_total"), "Unexpected metrics: {}", body);
}
