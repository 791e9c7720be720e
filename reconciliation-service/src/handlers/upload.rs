use super::multipart::Form;
use super::{join_error, resolve_profile};
use crate::dtos::{InlineUploadResponse, OffloadedUploadResponse};
use crate::engine::Normalizer;
use crate::ingest::{spawn_offloaded, Pipeline};
use crate::jobs::JobMeta;
use crate::models::{ExecutionMode, Origin, ProcessingMode};
use crate::services::record_upload;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

/// Accept one delimited file and either analyse it within the request or
/// hand it to a background job, depending on size and the `mode` hint.
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = Form::read(multipart).await?;
    let file = form.take_file("file")?;
    let hint: ProcessingMode = form
        .field("mode")
        .unwrap_or_default()
        .parse()
        .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))?;
    let profile = resolve_profile(&state.field_table, form.field("provider"), Origin::Merchant)?;

    let ingest = &state.config.ingest;
    let file_size = file.bytes.len();
    let mode = ExecutionMode::select(hint, file_size, ingest.inline_threshold_bytes);
    tracing::info!(
        file_name = %file.file_name,
        file_size,
        provider = %profile.name,
        hint = ?hint,
        mode = mode.as_str(),
        "Upload received"
    );

    let provider = profile.name.clone();
    let pipeline = Pipeline::new(Normalizer::new(profile), ingest.progress_row_interval);

    match mode {
        ExecutionMode::Inline => {
            let bytes = file.bytes;
            let outcome = tokio::task::spawn_blocking(move || pipeline.run_inline(&bytes))
                .await
                .map_err(join_error)??;
            record_upload(mode);

            Ok(Json(InlineUploadResponse {
                mode,
                data: outcome.records,
                metrics: outcome.metrics,
            })
            .into_response())
        }
        ExecutionMode::Offloaded => {
            tokio::fs::create_dir_all(&ingest.temp_dir).await?;
            let path = ingest.temp_dir.join(format!("{}.csv", Uuid::new_v4()));
            tokio::fs::write(&path, &file.bytes).await.map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "Failed to spool upload");
                AppError::from(e)
            })?;

            let job_id = state.manager.create_job(JobMeta {
                file_name: file.file_name,
                file_size,
                provider,
                temp_path: Some(path.clone()),
            });
            spawn_offloaded(state.manager.clone(), job_id, pipeline, path);
            record_upload(mode);

            Ok((
                StatusCode::ACCEPTED,
                Json(OffloadedUploadResponse { mode, job_id }),
            )
                .into_response())
        }
    }
}
