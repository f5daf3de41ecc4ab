use std::collections::HashMap;

use anyhow::Result;
use tracing::{error, info};
use uuid::Uuid;

use super::dto::{SubmitResponse, UploadResponse, VideoResponse};
use super::model::NewVideo;
use crate::modules::progress::model::WatchProgress;
use crate::config::settings::SourceBackend;
use crate::state::AppState;
use crate::transcode::{SubmitError, SubmitOutcome};

pub struct VideoService;

impl VideoService {
    fn local_thumbnails(state: &AppState) -> bool {
        state.config.source_backend == SourceBackend::Local
    }

    /// `viewer` is the authenticated caller, if any; their progress is
    /// attached to each entry.
    pub async fn list_videos(state: &AppState, viewer: Option<Uuid>) -> Result<Vec<VideoResponse>> {
        let local = Self::local_thumbnails(state);
        let videos = state.videos.list().await?;

        let mut progress: HashMap<Uuid, WatchProgress> = match viewer {
            Some(user_id) => state
                .progress
                .list_for_user(user_id)
                .await?
                .into_iter()
                .map(|record| (record.video_id, record))
                .collect(),
            None => HashMap::new(),
        };

        Ok(videos
            .into_iter()
            .map(|video| {
                let record = progress.remove(&video.id);
                VideoResponse::from_video(video, &state.config, local).with_progress(record)
            })
            .collect())
    }

    pub async fn get_video(state: &AppState, id: Uuid, viewer: Option<Uuid>) -> Result<Option<VideoResponse>> {
        let local = Self::local_thumbnails(state);
        let Some(video) = state.videos.find(id).await? else {
            return Ok(None);
        };

        let progress = match viewer {
            Some(user_id) => state.progress.get(user_id, id).await?,
            None => None,
        };
        Ok(Some(VideoResponse::from_video(video, &state.config, local).with_progress(progress)))
    }

    /// Ingestion hook: persist the record, then submit it for transcoding
    /// exactly once.
    pub async fn register_upload(
        state: &AppState,
        video: NewVideo,
    ) -> Result<UploadResponse, SubmitError> {
        let created = state
            .videos
            .create(video)
            .await
            .map_err(SubmitError::Store)?;
        info!(video_id = %created.id, "🎬 Video record created");

        let outcome = state.transcoder.submit(created.id).await.inspect_err(|e| {
            error!(video_id = %created.id, error = %e, "Video stored but not queued for transcoding");
        })?;

        let transcode = SubmitResponse::new(created.id, &outcome);
        let local = Self::local_thumbnails(state);
        Ok(UploadResponse {
            video: VideoResponse::from_video(created, &state.config, local),
            transcode,
        })
    }

    pub async fn request_transcode(state: &AppState, id: Uuid) -> Result<SubmitOutcome, SubmitError> {
        state.transcoder.submit(id).await
    }
}
