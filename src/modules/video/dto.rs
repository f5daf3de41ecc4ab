use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::model::{Video, VideoStatus};
use crate::modules::progress::model::WatchProgress;
use crate::config::settings::AppConfig;
use crate::transcode::SubmitOutcome;

/// Catalog view of a video. `hls_master_playlist_url` is only set while the
/// video is `READY`; `user_progress` is the caller's record, `null` for
/// anonymous callers or when they never started the video.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VideoResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: VideoStatus,
    pub failure_reason: Option<String>,
    pub hls_master_playlist_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    pub user_progress: Option<WatchProgress>,
}

impl VideoResponse {
    /// Thumbnails are only linkable when stored under the media root.
    pub fn from_video(video: Video, config: &AppConfig, local_thumbnails: bool) -> Self {
        let hls_master_playlist_url = video.playable_manifest().map(|loc| config.media_url(loc));
        let thumbnail_url = video
            .thumbnail_location
            .as_deref()
            .filter(|_| local_thumbnails)
            .map(|loc| config.media_url(loc));

        Self {
            id: video.id,
            title: video.title,
            description: video.description,
            thumbnail_url,
            status: video.status,
            failure_reason: video.failure_reason,
            hls_master_playlist_url,
            created_at: video.created_at,
            user_progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<WatchProgress>) -> Self {
        self.user_progress = progress;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitResult {
    Accepted,
    Deduplicated,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub video_id: Uuid,
    pub result: SubmitResult,
    /// Attempt number of the queued run; absent when deduplicated.
    pub attempt: Option<i32>,
}

impl SubmitResponse {
    pub fn new(video_id: Uuid, outcome: &SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Accepted(job) => Self {
                video_id,
                result: SubmitResult::Accepted,
                attempt: Some(job.attempt),
            },
            SubmitOutcome::Deduplicated => Self {
                video_id,
                result: SubmitResult::Deduplicated,
                attempt: None,
            },
        }
    }
}

/// Created video plus the outcome of its initial transcode submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub video: VideoResponse,
    pub transcode: SubmitResponse,
}
