use crate::models::JobStatus;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Progress notification for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub progress: u8,
    pub stage: String,
    pub status: JobStatus,
}

/// Topic-scoped progress fan-out: one broadcast channel per job id.
///
/// Delivery is at-most-once. A topic exists only while someone has
/// subscribed to it; events for jobs nobody watches are dropped.
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    topics: Arc<DashMap<Uuid, broadcast::Sender<ProgressEvent>>>,
    capacity: usize,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, job_id: Uuid) -> broadcast::Receiver<ProgressEvent> {
        self.topics
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Fire-and-forget; delivery failures are logged and never propagated.
    pub fn publish(&self, event: ProgressEvent) {
        let Some(sender) = self.topics.get(&event.job_id).map(|s| s.clone()) else {
            return;
        };
        let job_id = event.job_id;
        if let Err(e) = sender.send(event) {
            tracing::debug!(job_id = %job_id, error = %e, "No active progress subscribers");
        }
    }

    /// Drop the topic; subscribers drain what is buffered and then see the
    /// channel closed.
    pub fn close(&self, job_id: &Uuid) {
        self.topics.remove(job_id);
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}
