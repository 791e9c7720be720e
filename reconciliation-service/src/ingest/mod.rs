//! Delimited-file ingestion.
//!
//! Small uploads are decoded, normalized and aggregated inline; large ones are
//! handed to a blocking worker that streams the file from disk and reports
//! progress through the job manager.

mod decoder;
mod pipeline;
mod worker;

pub use decoder::{count_rows, decode_records, DecodedFile, RowDecoder};
pub use pipeline::{
    interpolate_progress, IngestOutcome, NoProgress, Pipeline, ProgressSink, STAGE_AGGREGATING,
    STAGE_COUNTED, STAGE_NORMALIZING, STAGE_READING,
};
pub use worker::spawn_offloaded;

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed delimited content at line {line}: {message}")]
    Decode { line: u64, message: String },

    #[error("file exceeds the limit of {limit} records")]
    TooManyRecords { limit: usize },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(e) => IngestError::Io(e),
            _ => IngestError::Decode { line, message },
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Io(e) => AppError::InternalError(anyhow::Error::new(e)),
            other => AppError::BadRequest(anyhow::Error::new(other)),
        }
    }
}
