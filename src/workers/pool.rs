use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::modules::video::events::TranscodeJob;
use crate::transcode::guard::JobGuard;
use crate::transcode::{JobOutcome, TranscodeWorker};

/// Capacity of the in-process job channel.
pub const JOB_CHANNEL_CAPACITY: usize = 1024;

pub fn job_channel() -> (
    async_channel::Sender<TranscodeJob>,
    async_channel::Receiver<TranscodeJob>,
) {
    async_channel::bounded(JOB_CHANNEL_CAPACITY)
}

/// Fixed set of tasks draining the job channel. Each task runs one job at a
/// time, so at most `size` encodes are active at once.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        size: usize,
        jobs: async_channel::Receiver<TranscodeJob>,
        worker: Arc<TranscodeWorker>,
        guard: Arc<dyn JobGuard>,
    ) -> Self {
        let size = size.max(1);
        let handles = (0..size)
            .map(|slot| {
                let jobs = jobs.clone();
                let worker = worker.clone();
                let guard = guard.clone();
                tokio::spawn(async move {
                    while let Ok(job) = jobs.recv().await {
                        process(slot, &worker, guard.as_ref(), job).await;
                    }
                    info!(slot, "Transcode worker stopped, job channel closed");
                })
            })
            .collect();

        info!("🎥 Started {} transcode workers", size);
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }
}

async fn process(slot: usize, worker: &TranscodeWorker, guard: &dyn JobGuard, job: TranscodeJob) {
    info!(slot, video_id = %job.video_id, attempt = job.attempt, "📦 Picked up transcoding job");

    // Restarts the marker TTL, so queue wait does not count against the run.
    match guard.renew(job.video_id, &job.lease).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(
                video_id = %job.video_id,
                attempt = job.attempt,
                "Another run holds this video, skipping superseded job"
            );
            return;
        }
        Err(e) => {
            error!(video_id = %job.video_id, error = %e, "Could not renew in-flight marker, skipping job");
            return;
        }
    }

    let outcome = worker.run(&job).await;
    match &outcome {
        JobOutcome::Ready { manifest_location } => {
            info!(video_id = %job.video_id, manifest = %manifest_location, "✅ Job completed");
        }
        JobOutcome::Failed { reason, detail } => {
            warn!(video_id = %job.video_id, reason = %reason, detail = %detail, "❌ Job failed");
        }
    }

    // Cleared on every terminal outcome so a retry can be admitted.
    if let Err(e) = guard.release(job.video_id, &job.lease).await {
        error!(video_id = %job.video_id, error = %e, "Failed to clear in-flight marker");
    }
}
