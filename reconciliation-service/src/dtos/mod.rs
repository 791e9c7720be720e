//! Request and response bodies of the HTTP surface.

use crate::engine::{DetectedTypes, Metrics, ReconciliationResult};
use crate::jobs::ProgressEvent;
use crate::models::{ExecutionMode, NormalizedRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const MAX_PAGE_LIMIT: usize = 1000;

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResultsQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: usize,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct InlineUploadResponse {
    pub mode: ExecutionMode,
    pub data: Vec<NormalizedRecord>,
    pub metrics: Metrics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffloadedUploadResponse {
    pub mode: ExecutionMode,
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub result: ReconciliationResult,
    pub detected: DetectedTypes,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub active_jobs: usize,
}

/// Messages a progress subscriber sends over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe {
        #[serde(rename = "jobId")]
        job_id: Uuid,
    },
    Unsubscribe {
        #[serde(rename = "jobId")]
        job_id: Uuid,
    },
}

/// Messages pushed to a progress subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Progress(ProgressEvent),
    Error { message: String },
}
