//! Services module for reconciliation-service.

pub mod metrics;

pub use metrics::{
    get_metrics, init_metrics, record_job_finished, record_reconciliation, record_upload,
};
