use super::pipeline::{Pipeline, ProgressSink};
use crate::jobs::JobManager;
use crate::models::JobStatus;
use crate::services::record_job_finished;
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Forwards pipeline progress into the job table.
struct JobProgress {
    manager: JobManager,
    job_id: Uuid,
}

impl ProgressSink for JobProgress {
    fn report(&self, stage: &str, progress: u8) {
        if let Err(e) = self.manager.update_progress(self.job_id, stage, progress) {
            tracing::debug!(job_id = %self.job_id, error = %e, "Dropped progress update");
        }
    }
}

/// Run an offloaded ingestion on the blocking pool and settle the job with
/// its outcome. The job always ends `completed` or `failed`.
pub fn spawn_offloaded(
    manager: JobManager,
    job_id: Uuid,
    pipeline: Pipeline,
    path: PathBuf,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = Instant::now();
        let provider = pipeline.provider().to_string();
        tracing::info!(job_id = %job_id, provider = %provider, "Offloaded ingestion started");

        let sink = JobProgress {
            manager: manager.clone(),
            job_id,
        };
        let result = tokio::task::spawn_blocking(move || pipeline.run_file(&path, &sink)).await;

        let (status, settled) = match result {
            Ok(Ok(outcome)) => {
                let records = outcome.records.len();
                let settled = manager.complete(job_id, outcome).map(|_| {
                    tracing::info!(
                        job_id = %job_id,
                        records,
                        duration_ms = start.elapsed().as_millis(),
                        "Offloaded ingestion succeeded"
                    );
                });
                (JobStatus::Completed, settled)
            }
            Ok(Err(e)) => (JobStatus::Failed, manager.fail(job_id, e.to_string())),
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Ingestion worker aborted");
                let settled = manager.fail(job_id, format!("ingestion worker aborted: {e}"));
                (JobStatus::Failed, settled)
            }
        };
        record_job_finished(status, start.elapsed().as_secs_f64());

        if let Err(e) = settled {
            tracing::error!(job_id = %job_id, error = %e, "Could not settle job");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldTable, JobConfig};
    use crate::engine::Normalizer;
    use crate::jobs::JobMeta;
    use crate::models::JobStatus;
    use std::io::Write;
    use std::time::Duration;

    fn setup() -> (JobManager, Pipeline) {
        let manager = JobManager::new(&JobConfig {
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
            progress_channel_capacity: 64,
        });
        let profile = FieldTable::embedded().unwrap().get("merchant").unwrap().clone();
        (manager, Pipeline::new(Normalizer::new(profile), 2))
    }

    #[tokio::test]
    async fn test_offloaded_job_completes_with_results() {
        let (manager, pipeline) = setup();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Tracking ID;Status;Amount\nT1;Completed;10\nT2;Declined;4\nT3;Pending;1\n").unwrap();

        let id = manager.create_job(JobMeta::default());
        let (_, mut rx) = manager.watch(id).unwrap();
        spawn_offloaded(manager.clone(), id, pipeline, file.path().to_path_buf())
            .await
            .unwrap();

        let results = manager.get_results(id, 1, 10).unwrap();
        assert_eq!(results.data.len(), 3);
        assert_eq!(results.metrics.successful, 1);

        let mut last = None;
        let mut completions = 0;
        while let Ok(event) = rx.recv().await {
            if event.progress == 100 {
                completions += 1;
            }
            last = Some(event);
        }
        assert_eq!(completions, 1);
        assert_eq!(last.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_offloaded_job_fails_on_unreadable_file() {
        let (manager, pipeline) = setup();
        let id = manager.create_job(JobMeta::default());
        spawn_offloaded(manager.clone(), id, pipeline, "/nonexistent/upload.csv".into())
            .await
            .unwrap();

        let view = manager.get_status(id).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.unwrap().contains("failed to read input"));
    }
}
