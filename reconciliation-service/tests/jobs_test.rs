mod common;

use axum::http::StatusCode;
use common::{job_id, TestApp, MERCHANT_CSV};
use reconciliation_service::jobs::JobMeta;
use uuid::Uuid;

#[tokio::test]
async fn offloaded_job_completes_and_pages_results() {
    let app = TestApp::spawn().await;

    let response = app.upload(MERCHANT_CSV.as_bytes(), Some("merchant"), Some("server")).await;
    assert_eq!(StatusCode::ACCEPTED, response.status());
    let id = job_id(&response.json().await.unwrap());
    app.wait_for_job(id).await;

    let status: serde_json::Value = app.get(&format!("/jobs/{}", id)).await.json().await.unwrap();
    assert_eq!(status["jobId"], id.to_string());
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"], 100);
    assert_eq!(status["fileName"], "export.csv");
    assert_eq!(status["provider"], "merchant");
    assert!(status["endTime"].is_string());

    let first: serde_json::Value = app
        .get(&format!("/jobs/{}/results?page=1&limit=2", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["data"].as_array().unwrap().len(), 2);
    assert_eq!(first["pagination"]["hasMore"], true);
    assert_eq!(first["metrics"]["total"], 3);

    let last: serde_json::Value = app
        .get(&format!("/jobs/{}/results?page=2&limit=2", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(last["data"].as_array().unwrap().len(), 1);
    assert_eq!(last["data"][0]["id"], "T3");
    assert_eq!(last["pagination"]["total"], 3);
    assert_eq!(last["pagination"]["totalPages"], 2);
    assert_eq!(last["pagination"]["hasMore"], false);
}

#[tokio::test]
async fn results_of_running_job_are_not_ready() {
    let app = TestApp::spawn().await;
    let id = app.manager.create_job(JobMeta::default());

    let status: serde_json::Value = app.get(&format!("/jobs/{}", id)).await.json().await.unwrap();
    assert_eq!(status["status"], "processing");

    let response = app.get(&format!("/jobs/{}/results", id)).await;
    assert_eq!(StatusCode::CONFLICT, response.status());
}

#[tokio::test]
async fn failed_job_reports_its_error() {
    let app = TestApp::spawn().await;

    let response = app
        .upload(b"Tracking ID;Status\nT1;\xff\xfe\n", Some("merchant"), Some("server"))
        .await;
    let id = job_id(&response.json().await.unwrap());
    let view = app.wait_for_job(id).await;
    assert!(view.error.is_some());

    let status: serde_json::Value = app.get(&format!("/jobs/{}", id)).await.json().await.unwrap();
    assert_eq!(status["status"], "failed");

    let response = app.get(&format!("/jobs/{}/results", id)).await;
    assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = TestApp::spawn().await;
    let id = Uuid::new_v4();

    assert_eq!(StatusCode::NOT_FOUND, app.get(&format!("/jobs/{}", id)).await.status());
    assert_eq!(
        StatusCode::NOT_FOUND,
        app.get(&format!("/jobs/{}/results", id)).await.status()
    );
}

#[tokio::test]
async fn invalid_paging_is_rejected() {
    let app = TestApp::spawn().await;
    let id = app.manager.create_job(JobMeta::default());

    let response = app.get(&format!("/jobs/{}/results?page=0", id)).await;
    assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());

    let response = app.get(&format!("/jobs/{}/results?limit=5000", id)).await;
    assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());
}

#[tokio::test]
async fn expired_jobs_are_purged() {
    let app = TestApp::spawn_with(|config| config.jobs.retention = std::time::Duration::ZERO).await;

    let response = app.upload(MERCHANT_CSV.as_bytes(), None, Some("server")).await;
    let id = job_id(&response.json().await.unwrap());
    app.wait_for_job(id).await;

    let purged = app
        .manager
        .purge_expired(chrono::Utc::now() + chrono::TimeDelta::seconds(1))
        .await;
    assert_eq!(purged, 1);
    assert_eq!(StatusCode::NOT_FOUND, app.get(&format!("/jobs/{}", id)).await.status());
}
