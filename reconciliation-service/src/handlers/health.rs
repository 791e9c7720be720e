use crate::dtos::HealthResponse;
use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

/// Liveness check; also reports how many jobs are still running.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: state.config.service_name.clone(),
        version: state.config.service_version.clone(),
        active_jobs: state.manager.active_jobs(),
    })
}

/// Readiness check: offloaded uploads need a writable spool directory.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let temp_dir = &state.config.ingest.temp_dir;
    if let Err(e) = tokio::fs::create_dir_all(temp_dir).await {
        tracing::warn!(
            path = %temp_dir.display(),
            error = %e,
            "Job spool directory unavailable"
        );
        return Err(AppError::ServiceUnavailable);
    }
    Ok(StatusCode::OK)
}

/// Metrics endpoint for Prometheus scraping.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
