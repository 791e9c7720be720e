use super::multipart::Form;
use super::{join_error, resolve_profile};
use crate::dtos::ReconcileResponse;
use crate::engine::{detect_file_kind, reconcile, DetectedTypes, Normalizer};
use crate::ingest::{decode_records, IngestError};
use crate::models::Origin;
use crate::services::record_reconciliation;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use service_core::error::AppError;

/// Reconcile a merchant export against a platform export.
///
/// Both files are decoded with the requested profiles (or the side defaults)
/// and capped at the configured record count per side.
pub async fn reconcile_files(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ReconcileResponse>, AppError> {
    let mut form = Form::read(multipart).await?;
    let merchant_file = form.take_file("merchant")?;
    let platform_file = form.take_file("platform")?;
    let merchant = Normalizer::with_origin(
        resolve_profile(&state.field_table, form.field("merchantProvider"), Origin::Merchant)?,
        Origin::Merchant,
    );
    let platform = Normalizer::with_origin(
        resolve_profile(&state.field_table, form.field("platformProvider"), Origin::Platform)?,
        Origin::Platform,
    );

    let limit = state.config.ingest.max_reconcile_records;
    let matching = state.config.matching;
    let table = state.field_table.clone();

    let response = tokio::task::spawn_blocking(move || -> Result<ReconcileResponse, IngestError> {
        let merchant_decoded = decode_records(&merchant_file.bytes, &merchant, Some(limit))?;
        let platform_decoded = decode_records(&platform_file.bytes, &platform, Some(limit))?;

        let detected = DetectedTypes {
            merchant_file: detect_file_kind(&merchant_decoded.headers, &table),
            platform_file: detect_file_kind(&platform_decoded.headers, &table),
        };
        let result = reconcile(&merchant_decoded.records, &platform_decoded.records, &matching);
        Ok(ReconcileResponse { result, detected })
    })
    .await
    .map_err(join_error)??;

    let summary = &response.result.summary;
    record_reconciliation(summary);
    tracing::info!(
        total_merchant = summary.total_merchant,
        total_platform = summary.total_platform,
        matched = summary.matched,
        status_mismatch = summary.status_mismatch,
        match_rate = %summary.match_rate,
        merchant_file = ?response.detected.merchant_file,
        platform_file = ?response.detected.platform_file,
        "Reconciliation finished"
    );

    Ok(Json(response))
}
