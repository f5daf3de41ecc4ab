use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::guard::JobGuard;
use crate::modules::video::events::TranscodeJob;
use crate::modules::video::repository::VideoStore;

/// Hands an admitted job to whatever runs the workers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &TranscodeJob) -> anyhow::Result<()>;
}

/// In-process queue feeding the local worker pool.
#[derive(Clone)]
pub struct LocalJobQueue {
    tx: async_channel::Sender<TranscodeJob>,
}

impl LocalJobQueue {
    pub fn new(tx: async_channel::Sender<TranscodeJob>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, job: &TranscodeJob) -> anyhow::Result<()> {
        // Never wait on a busy pool; a full queue is reported to the caller.
        self.tx
            .try_send(job.clone())
            .map_err(|e| anyhow!("Transcode queue rejected job: {}", e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(TranscodeJob),
    /// A run for this video is already in flight; nothing was queued.
    Deduplicated,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("video {0} not found")]
    VideoNotFound(Uuid),

    #[error("job guard unavailable: {0}")]
    Guard(#[source] anyhow::Error),

    #[error("video store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("failed to enqueue transcode job: {0}")]
    Queue(#[source] anyhow::Error),
}

/// Entry point for transcode requests. Admits at most one in-flight job per
/// video; the worker pool releases the marker when the run ends.
#[derive(Clone)]
pub struct TranscodeDispatcher {
    guard: Arc<dyn JobGuard>,
    queue: Arc<dyn JobQueue>,
    videos: Arc<dyn VideoStore>,
}

impl TranscodeDispatcher {
    pub fn new(guard: Arc<dyn JobGuard>, queue: Arc<dyn JobQueue>, videos: Arc<dyn VideoStore>) -> Self {
        Self {
            guard,
            queue,
            videos,
        }
    }

    pub async fn submit(&self, video_id: Uuid) -> Result<SubmitOutcome, SubmitError> {
        let Some(lease) = self
            .guard
            .try_acquire(video_id)
            .await
            .map_err(SubmitError::Guard)?
        else {
            info!(video_id = %video_id, "Transcode already in flight, submission deduplicated");
            return Ok(SubmitOutcome::Deduplicated);
        };

        let attempt = match self.videos.next_attempt(video_id).await {
            Ok(Some(attempt)) => attempt,
            Ok(None) => {
                self.release(video_id, &lease).await;
                return Err(SubmitError::VideoNotFound(video_id));
            }
            Err(e) => {
                self.release(video_id, &lease).await;
                return Err(SubmitError::Store(e));
            }
        };

        let job = TranscodeJob::new(video_id, attempt, lease);
        if let Err(e) = self.queue.enqueue(&job).await {
            self.release(video_id, &job.lease).await;
            return Err(SubmitError::Queue(e));
        }

        info!(video_id = %video_id, attempt, "📦 Transcode job submitted");
        Ok(SubmitOutcome::Accepted(job))
    }

    async fn release(&self, video_id: Uuid, lease: &str) {
        if let Err(e) = self.guard.release(video_id, lease).await {
            warn!(video_id = %video_id, error = %e, "Failed to release in-flight marker");
        }
    }
}
