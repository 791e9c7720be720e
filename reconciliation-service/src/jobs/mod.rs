//! Asynchronous ingestion jobs: storage, lifecycle and progress delivery.

mod manager;
mod progress;
mod store;

pub use manager::{JobManager, JobView, Pagination, PollPolicy, ResultsPage};
pub use progress::{ProgressBroadcaster, ProgressEvent};
pub use store::{Job, JobMeta, JobStore};

use crate::models::JobStatus;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} is not ready (status: {})", status.as_str())]
    NotReady { id: Uuid, status: JobStatus },

    #[error("Job {0} has already finished")]
    AlreadyTerminal(Uuid),

    #[error("Job {id} failed: {message}")]
    Failed { id: Uuid, message: String },

    #[error("Job {id} did not finish after {attempts} polls")]
    Timeout { id: Uuid, attempts: u32 },
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(_) => AppError::NotFound(anyhow::Error::new(err)),
            JobError::NotReady { .. } | JobError::AlreadyTerminal(_) => {
                AppError::Conflict(anyhow::Error::new(err))
            }
            JobError::Failed { message, .. } => AppError::ProcessingFailed(message),
            JobError::Timeout { .. } => AppError::GatewayTimeout(err.to_string()),
        }
    }
}
