use anyhow::Result;
use thiserror::Error;
use uuid::Uuid;

use super::model::{ProgressUpdate, WatchProgress};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("video {0} not found")]
    VideoNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct ProgressService;

impl ProgressService {
    /// `None` means the user never started this video.
    pub async fn get_progress(
        state: &AppState,
        user_id: Uuid,
        video_id: Uuid,
    ) -> Result<Option<WatchProgress>, ProgressError> {
        Self::ensure_video(state, video_id).await?;
        Ok(state.progress.get(user_id, video_id).await?)
    }

    pub async fn record_progress(
        state: &AppState,
        user_id: Uuid,
        video_id: Uuid,
        update: ProgressUpdate,
    ) -> Result<WatchProgress, ProgressError> {
        Self::ensure_video(state, video_id).await?;
        Ok(state.progress.upsert(user_id, video_id, update).await?)
    }

    async fn ensure_video(state: &AppState, video_id: Uuid) -> Result<(), ProgressError> {
        match state.videos.find(video_id).await? {
            Some(_) => Ok(()),
            None => Err(ProgressError::VideoNotFound(video_id)),
        }
    }
}
