use super::progress::{ProgressBroadcaster, ProgressEvent};
use super::store::{Job, JobMeta, JobStore};
use super::JobError;
use crate::config::JobConfig;
use crate::engine::Metrics;
use crate::ingest::IngestOutcome;
use crate::models::{JobStatus, NormalizedRecord};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How often and how long a caller polls a job before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    /// 60 attempts, 5 seconds apart.
    fn default() -> Self {
        Self {
            attempts: 60,
            interval: Duration::from_secs(5),
        }
    }
}

const STAGE_DONE: &str = "done";
const STAGE_FAILED: &str = "failed";

/// Externally visible snapshot of a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub stage: String,
    pub file_name: String,
    pub file_size: usize,
    pub provider: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            stage: job.stage.clone(),
            file_name: job.meta.file_name.clone(),
            file_size: job.meta.file_size,
            provider: job.meta.provider.clone(),
            start_time: job.start_time,
            end_time: job.end_time,
            error: job.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

impl Pagination {
    /// 1-based page over `total` items. Returns the pagination block and the
    /// index range of the page.
    pub fn new(page: usize, limit: usize, total: usize) -> (Self, std::ops::Range<usize>) {
        let page = page.max(1);
        let limit = limit.max(1);
        let total_pages = total.div_ceil(limit);
        let start = (page - 1).saturating_mul(limit).min(total);
        let end = start.saturating_add(limit).min(total);

        let pagination = Self {
            page,
            limit,
            total,
            total_pages,
            has_more: page < total_pages,
        };
        (pagination, start..end)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsPage {
    pub data: Vec<NormalizedRecord>,
    pub metrics: Metrics,
    pub pagination: Pagination,
}

/// Owns the job lifecycle: `processing -> completed | failed`, nothing else.
///
/// Only the worker running a job calls `update_progress`, `complete` or
/// `fail` for it.
#[derive(Debug, Clone)]
pub struct JobManager {
    store: JobStore,
    progress: ProgressBroadcaster,
    retention: Duration,
}

impl JobManager {
    pub fn new(config: &JobConfig) -> Self {
        Self {
            store: JobStore::new(),
            progress: ProgressBroadcaster::new(config.progress_channel_capacity),
            retention: config.retention,
        }
    }

    pub fn create_job(&self, meta: JobMeta) -> Uuid {
        let job = Job::new(meta);
        let id = job.id;
        info!(
            job_id = %id,
            file_name = %job.meta.file_name,
            file_size = job.meta.file_size,
            provider = %job.meta.provider,
            "Job created"
        );
        self.store.insert(job);
        id
    }

    /// Record intermediate progress. Progress never moves backwards and stays
    /// below 100 until the job completes.
    pub fn update_progress(&self, id: Uuid, stage: &str, progress: u8) -> Result<(), JobError> {
        let event = self
            .store
            .update(&id, |job| {
                if job.status.is_terminal() {
                    return Err(JobError::AlreadyTerminal(id));
                }
                job.progress = job.progress.max(progress.min(99));
                job.stage = stage.to_string();
                Ok(event_for(job))
            })
            .ok_or(JobError::NotFound(id))??;

        debug!(job_id = %id, stage, progress = event.progress, "Job progress");
        self.progress.publish(event);
        Ok(())
    }

    pub fn complete(&self, id: Uuid, outcome: IngestOutcome) -> Result<(), JobError> {
        let records = outcome.records.len();
        let outcome = Arc::new(outcome);
        self.finish(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.stage = STAGE_DONE.to_string();
            job.results = Some(outcome);
        })?;
        info!(job_id = %id, records, "Job completed");
        Ok(())
    }

    pub fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        warn!(job_id = %id, error = %error, "Job failed");
        self.finish(id, |job| {
            job.status = JobStatus::Failed;
            job.stage = STAGE_FAILED.to_string();
            job.error = Some(error);
        })
    }

    /// Apply a terminal transition, then emit the final event and retire the
    /// job's progress topic.
    fn finish(&self, id: Uuid, apply: impl FnOnce(&mut Job)) -> Result<(), JobError> {
        let event = self
            .store
            .update(&id, |job| {
                if job.status.is_terminal() {
                    return Err(JobError::AlreadyTerminal(id));
                }
                apply(job);
                job.end_time = Some(Utc::now());
                Ok(event_for(job))
            })
            .ok_or(JobError::NotFound(id))??;

        self.progress.publish(event);
        self.progress.close(&id);
        Ok(())
    }

    pub fn get_status(&self, id: Uuid) -> Result<JobView, JobError> {
        self.store
            .get(&id)
            .map(|job| JobView::from(&job))
            .ok_or(JobError::NotFound(id))
    }

    /// Page of normalized records (1-based `page`) plus the file's metrics.
    pub fn get_results(&self, id: Uuid, page: usize, limit: usize) -> Result<ResultsPage, JobError> {
        let job = self.store.get(&id).ok_or(JobError::NotFound(id))?;
        let results = match (job.status, job.results) {
            (JobStatus::Completed, Some(results)) => results,
            (JobStatus::Failed, _) => {
                return Err(JobError::Failed {
                    id,
                    message: job.error.unwrap_or_default(),
                })
            }
            (status, _) => return Err(JobError::NotReady { id, status }),
        };

        let (pagination, range) = Pagination::new(page, limit, results.records.len());
        Ok(ResultsPage {
            data: results.records[range].to_vec(),
            metrics: results.metrics.clone(),
            pagination,
        })
    }

    /// Subscribe to a job's progress and return its current state.
    ///
    /// The subscription is taken before the snapshot, so a running job's
    /// later events are never missed. Subscriptions to finished jobs are
    /// closed straight away.
    pub fn watch(&self, id: Uuid) -> Result<(JobView, broadcast::Receiver<ProgressEvent>), JobError> {
        let receiver = self.progress.subscribe(id);
        match self.get_status(id) {
            Ok(view) => {
                if view.status.is_terminal() {
                    self.progress.close(&id);
                }
                Ok((view, receiver))
            }
            Err(e) => {
                self.progress.close(&id);
                Err(e)
            }
        }
    }

    /// Poll until the job leaves `processing`, giving up after
    /// `policy.attempts` status reads.
    pub async fn wait_for_completion(
        &self,
        id: Uuid,
        policy: PollPolicy,
    ) -> Result<JobView, JobError> {
        let PollPolicy { attempts, interval } = policy;
        for attempt in 0..attempts {
            let view = self.get_status(id)?;
            if view.status.is_terminal() {
                return Ok(view);
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Err(JobError::Timeout { id, attempts })
    }

    pub fn active_jobs(&self) -> usize {
        self.store.count_with_status(JobStatus::Processing)
    }

    /// Remove terminal jobs whose retention window ended before `now`, along
    /// with their spooled files. Returns how many were purged.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = TimeDelta::from_std(self.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return 0;
        };

        let mut purged = 0;
        for id in self.store.ended_before(cutoff) {
            let Some(job) = self.store.remove(&id) else {
                continue;
            };
            self.progress.close(&id);
            if let Some(path) = &job.meta.temp_path {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(
                        job_id = %id,
                        path = %path.display(),
                        error = %e,
                        "Failed to delete job file"
                    ),
                }
            }
            purged += 1;
        }

        if purged > 0 {
            info!(
                purged,
                remaining = self.store.len(),
                progress_topics = self.progress.topic_count(),
                "Purged expired jobs"
            );
        }
        purged
    }

    /// Periodically purge expired jobs for the life of the runtime.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.purge_expired(Utc::now()).await;
            }
        })
    }
}

fn event_for(job: &Job) -> ProgressEvent {
    ProgressEvent {
        job_id: job.id,
        progress: job.progress,
        stage: job.stage.clone(),
        status: job.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregate;
    use crate::engine::normalize_status;
    use crate::models::Origin;
    use rust_decimal::Decimal;
    use std::io::Write;

    fn manager(retention: Duration) -> JobManager {
        JobManager::new(&JobConfig {
            retention,
            sweep_interval: Duration::from_secs(60),
            progress_channel_capacity: 16,
        })
    }

    fn outcome(n: usize) -> IngestOutcome {
        let records: Vec<NormalizedRecord> = (0..n)
            .map(|i| NormalizedRecord {
                id: Some(format!("T{i}")),
                raw_status: "success".to_string(),
                normalized_status: normalize_status("success"),
                amount: Decimal::ONE,
                timestamp: None,
                payment_method: None,
                company: None,
                provider: "platform".to_string(),
                currency: None,
                origin: Origin::Platform,
            })
            .collect();
        let metrics = aggregate(&records, "platform");
        IngestOutcome { records, metrics }
    }

    #[test]
    fn test_lifecycle_and_results_not_ready() {
        let jobs = manager(Duration::from_secs(3600));
        let id = jobs.create_job(JobMeta::default());

        let view = jobs.get_status(id).unwrap();
        assert_eq!((view.status, view.progress), (JobStatus::Processing, 0));
        assert_eq!(jobs.active_jobs(), 1);
        assert!(matches!(
            jobs.get_results(id, 1, 10),
            Err(JobError::NotReady { status: JobStatus::Processing, .. })
        ));

        jobs.update_progress(id, "normalizing", 40).unwrap();
        jobs.complete(id, outcome(3)).unwrap();

        let view = jobs.get_status(id).unwrap();
        assert_eq!((view.status, view.progress), (JobStatus::Completed, 100));
        assert!(view.end_time.is_some());
        assert_eq!(jobs.active_jobs(), 0);
    }

    #[test]
    fn test_no_transitions_out_of_terminal_states() {
        let jobs = manager(Duration::from_secs(3600));
        let id = jobs.create_job(JobMeta::default());
        jobs.fail(id, "bad file").unwrap();

        assert!(matches!(jobs.complete(id, outcome(1)), Err(JobError::AlreadyTerminal(_))));
        assert!(matches!(jobs.fail(id, "again"), Err(JobError::AlreadyTerminal(_))));
        assert!(matches!(
            jobs.update_progress(id, "normalizing", 50),
            Err(JobError::AlreadyTerminal(_))
        ));

        let view = jobs.get_status(id).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.as_deref(), Some("bad file"));
        assert!(matches!(
            jobs.get_results(id, 1, 10),
            Err(JobError::Failed { message, .. }) if message == "bad file"
        ));
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let jobs = manager(Duration::from_secs(3600));
        let id = jobs.create_job(JobMeta::default());
        jobs.update_progress(id, "normalizing", 60).unwrap();
        jobs.update_progress(id, "normalizing", 30).unwrap();
        assert_eq!(jobs.get_status(id).unwrap().progress, 60);
        jobs.update_progress(id, "aggregating", 100).unwrap();
        assert_eq!(jobs.get_status(id).unwrap().progress, 99);
    }

    #[test]
    fn test_unknown_job() {
        let jobs = manager(Duration::from_secs(3600));
        let id = Uuid::new_v4();
        assert!(matches!(jobs.get_status(id), Err(JobError::NotFound(_))));
        assert!(matches!(jobs.get_results(id, 1, 10), Err(JobError::NotFound(_))));
        assert!(matches!(jobs.update_progress(id, "x", 1), Err(JobError::NotFound(_))));
    }

    #[test]
    fn test_results_pagination_with_partial_last_page() {
        let jobs = manager(Duration::from_secs(3600));
        let id = jobs.create_job(JobMeta::default());
        jobs.complete(id, outcome(25)).unwrap();

        let first = jobs.get_results(id, 1, 10).unwrap();
        assert_eq!(first.data.len(), 10);
        assert_eq!(first.data[0].id.as_deref(), Some("T0"));
        assert!(first.pagination.has_more);
        assert_eq!(first.metrics.total, 25);

        let last = jobs.get_results(id, 3, 10).unwrap();
        assert_eq!(last.data.len(), 5);
        assert_eq!(last.data[0].id.as_deref(), Some("T20"));
        assert_eq!(
            last.pagination,
            Pagination { page: 3, limit: 10, total: 25, total_pages: 3, has_more: false }
        );

        assert!(jobs.get_results(id, 4, 10).unwrap().data.is_empty());
    }

    #[test]
    fn test_pagination_edges() {
        let (p, range) = Pagination::new(1, 10, 0);
        assert_eq!((p.total_pages, p.has_more, range), (0, false, 0..0));
        let (p, range) = Pagination::new(2, 5, 10);
        assert_eq!((p.has_more, range), (false, 5..10));
        let (_, range) = Pagination::new(usize::MAX, usize::MAX, 3);
        assert_eq!(range, 3..3);
    }

    #[tokio::test]
    async fn test_watch_streams_progress_then_closes() {
        let jobs = manager(Duration::from_secs(3600));
        let id = jobs.create_job(JobMeta::default());
        let (view, mut rx) = jobs.watch(id).unwrap();
        assert_eq!(view.status, JobStatus::Processing);

        jobs.update_progress(id, "counted", 20).unwrap();
        jobs.complete(id, outcome(1)).unwrap();

        assert_eq!(rx.recv().await.unwrap().progress, 20);
        let done = rx.recv().await.unwrap();
        assert_eq!((done.progress, done.status), (100, JobStatus::Completed));
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_watch_finished_job_returns_snapshot() {
        let jobs = manager(Duration::from_secs(3600));
        let id = jobs.create_job(JobMeta::default());
        jobs.complete(id, outcome(1)).unwrap();

        let (view, mut rx) = jobs.watch(id).unwrap();
        assert_eq!(view.status, JobStatus::Completed);
        assert!(rx.recv().await.is_err());
        assert!(jobs.watch(Uuid::new_v4()).is_err());
    }

    #[tokio::test]
    async fn test_wait_for_completion_times_out() {
        let jobs = manager(Duration::from_secs(3600));
        let id = jobs.create_job(JobMeta::default());
        let err = jobs
            .wait_for_completion(
                id,
                PollPolicy {
                    attempts: 3,
                    interval: Duration::from_millis(5),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Timeout { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_wait_for_completion_returns_terminal_view() {
        let jobs = manager(Duration::from_secs(3600));
        let id = jobs.create_job(JobMeta::default());

        let worker = jobs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            worker.complete(id, outcome(2)).unwrap();
        });

        let view = jobs
            .wait_for_completion(
                id,
                PollPolicy {
                    attempts: 50,
                    interval: Duration::from_millis(10),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_purge_removes_expired_jobs_and_files() {
        let jobs = manager(Duration::from_secs(60));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"tracking_id\n").unwrap();
        let (_, path) = file.keep().unwrap();

        let expired = jobs.create_job(JobMeta {
            temp_path: Some(path.clone()),
            ..JobMeta::default()
        });
        let running = jobs.create_job(JobMeta::default());
        jobs.complete(expired, outcome(1)).unwrap();

        assert_eq!(jobs.purge_expired(Utc::now()).await, 0);
        assert_eq!(jobs.purge_expired(Utc::now() + TimeDelta::minutes(2)).await, 1);
        assert!(matches!(jobs.get_status(expired), Err(JobError::NotFound(_))));
        assert!(jobs.get_status(running).is_ok());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_purge_tolerates_missing_files() {
        let jobs = manager(Duration::ZERO);
        let id = jobs.create_job(JobMeta {
            temp_path: Some("/nonexistent/job.csv".into()),
            ..JobMeta::default()
        });
        jobs.fail(id, "boom").unwrap();
        assert_eq!(jobs.purge_expired(Utc::now() + TimeDelta::seconds(1)).await, 1);
    }

    #[test]
    fn test_default_poll_policy_is_five_minutes() {
        let policy = PollPolicy::default();
        assert_eq!(policy.attempts, 60);
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.interval * policy.attempts, Duration::from_secs(300));
    }
}
