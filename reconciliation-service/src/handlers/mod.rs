pub mod health;
pub mod jobs;
mod multipart;
pub mod reconcile;
pub mod upload;
pub mod ws;

pub use health::{health_check, metrics_handler, readiness_check};
pub use jobs::{get_job_results, get_job_status};
pub use reconcile::reconcile_files;
pub use upload::upload_file;
pub use ws::progress_socket;

use crate::config::{FieldTable, ProviderProfile};
use crate::models::Origin;
use service_core::error::AppError;

/// Resolve a caller-supplied provider tag, falling back to the side's default
/// profile when the tag is absent or blank.
fn resolve_profile(
    table: &FieldTable,
    tag: Option<&str>,
    side: Origin,
) -> Result<ProviderProfile, AppError> {
    let Some(name) = tag.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(table.default_for(side).clone());
    };
    table
        .get(name)
        .cloned()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown provider: {}", name)))
}

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Processing task failed: {}", e))
}
