use crate::dtos::ResultsQuery;
use crate::jobs::{JobView, ResultsPage};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, AppError> {
    Ok(Json(state.manager.get_status(job_id)?))
}

pub async fn get_job_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ResultsPage>, AppError> {
    query.validate()?;
    let page = state.manager.get_results(job_id, query.page, query.limit)?;
    tracing::debug!(
        job_id = %job_id,
        page = page.pagination.page,
        rows = page.data.len(),
        "Serving job results"
    );
    Ok(Json(page))
}
