use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, warn};
use uuid::Uuid;

use super::error::TranscodeError;
use super::manifest::MASTER_MANIFEST;
use crate::modules::video::model::VideoStatus;
use crate::modules::video::repository::VideoStore;

const RUNS_DIR: &str = ".runs";

/// On-disk scheme for HLS assets under the media root:
///
/// ```text
/// videos/hls/<video_id>                 -> symlink to the published run
/// videos/hls/<video_id>/master.m3u8
/// videos/hls/<video_id>/variant_<n>.m3u8
/// videos/hls/<video_id>/segment_<n>_<NNN>.ts
/// videos/hls/.runs/<video_id>/<run>/    staging and release directories
/// ```
#[derive(Debug, Clone)]
pub struct HlsLayout {
    media_root: PathBuf,
}

impl HlsLayout {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    pub fn hls_root(&self) -> PathBuf {
        self.media_root.join("videos").join("hls")
    }

    pub fn runs_dir(&self, video_id: Uuid) -> PathBuf {
        self.hls_root().join(RUNS_DIR).join(video_id.to_string())
    }

    pub fn published_dir(&self, video_id: Uuid) -> PathBuf {
        self.hls_root().join(video_id.to_string())
    }

    /// Manifest location as stored on the video, relative to the media root.
    pub fn manifest_location(video_id: Uuid) -> String {
        format!("videos/hls/{}/{}", video_id, MASTER_MANIFEST)
    }

    /// Create a fresh staging directory for one run. Names never repeat, so
    /// a rerun cannot collide with leftovers of an earlier one.
    pub async fn create_run_dir(&self, video_id: Uuid, attempt: i32) -> io::Result<PathBuf> {
        let nonce = Uuid::new_v4().simple().to_string();
        let dir = self
            .runs_dir(video_id)
            .join(format!("attempt-{}-{}", attempt, &nonce[..8]));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Point the published link at `run_dir`.
    ///
    /// Replacing an existing link is a single `rename`. A plain directory at
    /// the published path (from before link-based publishing) is first moved
    /// into the runs area, so that one promotion has a short window where
    /// the path does not exist.
    pub async fn promote(&self, video_id: Uuid, run_dir: &Path) -> io::Result<()> {
        let hls_root = self.hls_root();
        let published = self.published_dir(video_id);
        let run_name = run_dir
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "run dir has no name"))?;
        // Relative target keeps the tree relocatable.
        let target = Path::new(RUNS_DIR).join(video_id.to_string()).join(run_name);

        if let Ok(meta) = tokio::fs::symlink_metadata(&published).await {
            if meta.is_dir() {
                let legacy = self
                    .runs_dir(video_id)
                    .join(format!("legacy-{}", Uuid::new_v4().simple()));
                warn!(video_id = %video_id, "Moving unlinked HLS directory aside before publish");
                tokio::fs::rename(&published, &legacy).await?;
            }
        }

        let staging_link = hls_root.join(format!(".{}.link-{}", video_id, Uuid::new_v4().simple()));
        tokio::fs::symlink(&target, &staging_link).await?;
        if let Err(e) = tokio::fs::rename(&staging_link, &published).await {
            let _ = tokio::fs::remove_file(&staging_link).await;
            return Err(e);
        }

        debug!(video_id = %video_id, target = %target.display(), "HLS link swapped");
        Ok(())
    }

    /// Remove every run directory of `video_id` except `keep`.
    pub async fn prune_superseded(&self, video_id: Uuid, keep: &Path) {
        let runs = self.runs_dir(video_id);
        let mut entries = match tokio::fs::read_dir(&runs).await {
            Ok(entries) => entries,
            Err(_) => return,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path == keep {
                continue;
            }
            let removed = match entry.file_type().await {
                Ok(kind) if kind.is_dir() => tokio::fs::remove_dir_all(&path).await,
                _ => tokio::fs::remove_file(&path).await,
            };
            if let Err(e) = removed {
                warn!(video_id = %video_id, path = %path.display(), error = %e, "Failed to prune old run");
            }
        }
    }

    /// Remove a run that will not be published.
    pub async fn discard(&self, run_dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(run_dir).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %run_dir.display(), error = %e, "Failed to discard run directory");
            }
        }
    }
}

/// Single writer of a video's terminal state.
#[derive(Clone)]
pub struct CompletionUpdater {
    videos: Arc<dyn VideoStore>,
}

impl CompletionUpdater {
    pub fn new(videos: Arc<dyn VideoStore>) -> Self {
        Self { videos }
    }

    /// Persist `Ready` and the manifest location in one update.
    ///
    /// On failure the video goes back to the state it had before the run
    /// (`previous`); the published files stay on disk for a cleanup sweep.
    pub async fn publish(
        &self,
        video_id: Uuid,
        manifest_location: &str,
        previous: (VideoStatus, Option<String>),
    ) -> Result<(), TranscodeError> {
        match self.videos.publish_ready(video_id, manifest_location).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(
                    target: "operator",
                    video_id = %video_id,
                    manifest = manifest_location,
                    error = %e,
                    "Encoded asset could not be published; files retained, retry required"
                );
                let (status, reason) = previous;
                if let Err(restore_err) = self.videos.restore_status(video_id, status, reason).await {
                    // The stale-run reconciler picks it up from `Encoding`.
                    error!(
                        target: "operator",
                        video_id = %video_id,
                        error = %restore_err,
                        "Could not restore previous status after publish failure"
                    );
                }
                Err(TranscodeError::Publish(e.to_string()))
            }
        }
    }

    pub async fn record_failure(&self, video_id: Uuid, err: &TranscodeError) {
        if let Err(e) = self.videos.mark_failed(video_id, err.reason()).await {
            error!(
                target: "operator",
                video_id = %video_id,
                reason = %err.reason(),
                error = %e,
                "Could not record transcode failure"
            );
        }
    }
}
