use crate::ingest::IngestOutcome;
use crate::models::JobStatus;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Descriptive fields supplied when a job is created.
#[derive(Debug, Clone, Default)]
pub struct JobMeta {
    pub file_name: String,
    pub file_size: usize,
    pub provider: String,
    /// Spooled upload owned by the job; removed when the job is purged.
    pub temp_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub stage: String,
    pub meta: JobMeta,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub results: Option<Arc<IngestOutcome>>,
}

impl Job {
    pub fn new(meta: JobMeta) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Processing,
            progress: 0,
            stage: "queued".to_string(),
            meta,
            start_time: Utc::now(),
            end_time: None,
            error: None,
            results: None,
        }
    }
}

/// Concurrency-safe job table.
///
/// Closures passed to `update` run while the entry's shard is locked and must
/// not touch the store again.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<Uuid, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }

    pub fn update<T>(&self, id: &Uuid, f: impl FnOnce(&mut Job) -> T) -> Option<T> {
        self.jobs.get_mut(id).map(|mut job| f(&mut job))
    }

    pub fn remove(&self, id: &Uuid) -> Option<Job> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    /// Ids of terminal jobs that ended at or before `cutoff`.
    pub fn ended_before(&self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        self.jobs
            .iter()
            .filter(|job| job.status.is_terminal() && job.end_time.is_some_and(|t| t <= cutoff))
            .map(|job| job.id)
            .collect()
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
