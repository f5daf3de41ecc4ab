use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use cron::Schedule;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::modules::video::repository::VideoStore;
use crate::transcode::guard::JobGuard;
use crate::transcode::FailureReason;

/// Moves videos stuck in `Encoding` with no live run to `Failed`, so an
/// operator sees them and can resubmit.
#[derive(Clone)]
pub struct StaleRunReconciler {
    videos: Arc<dyn VideoStore>,
    guard: Arc<dyn JobGuard>,
    stale_after: Duration,
}

impl StaleRunReconciler {
    pub fn new(videos: Arc<dyn VideoStore>, guard: Arc<dyn JobGuard>, stale_after: Duration) -> Self {
        Self {
            videos,
            guard,
            stale_after,
        }
    }

    /// One pass. Returns how many videos were failed.
    pub async fn sweep(&self) -> Result<usize> {
        let cutoff = OffsetDateTime::now_utc() - self.stale_after;
        let candidates = self.videos.list_stale_encoding(cutoff).await?;

        let mut failed = 0;
        for video_id in candidates {
            match self.guard.is_held(video_id).await {
                Ok(true) => {
                    debug!(video_id = %video_id, "Encoding run still in flight, leaving it");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(video_id = %video_id, error = %e, "Could not check in-flight marker, skipping");
                    continue;
                }
            }

            if self
                .videos
                .fail_if_encoding(video_id, FailureReason::Interrupted)
                .await?
            {
                warn!(
                    target: "operator",
                    video_id = %video_id,
                    "Interrupted transcode marked FAILED; resubmit to retry"
                );
                failed += 1;
            }
        }

        Ok(failed)
    }
}

/// Sweep once now, then on every tick of `expression`.
pub async fn start_reconciler(reconciler: StaleRunReconciler, expression: String) -> Result<()> {
    let schedule = Schedule::from_str(&expression)
        .map_err(|e| anyhow!("Invalid reconcile schedule '{}': {}", expression, e))?;

    info!("🧹 Stale-run reconciler scheduled: {}", expression);
    run_sweep(&reconciler).await;

    loop {
        let next = match schedule.upcoming(Utc).next() {
            Some(next) => next,
            None => {
                warn!("Reconcile schedule has no upcoming runs, stopping");
                return Ok(());
            }
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
        run_sweep(&reconciler).await;
    }
}

async fn run_sweep(reconciler: &StaleRunReconciler) {
    match reconciler.sweep().await {
        Ok(0) => debug!("Reconcile sweep found nothing stale"),
        Ok(n) => info!("🧹 Reconcile sweep failed {} interrupted videos", n),
        Err(e) => error!("Reconcile sweep failed: {}", e),
    }
}
