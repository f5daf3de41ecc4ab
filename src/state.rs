use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::progress::repository::ProgressStore;
use crate::modules::video::repository::VideoStore;
use crate::transcode::TranscodeDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub videos: Arc<dyn VideoStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub transcoder: TranscodeDispatcher,
    /// Present when sources are stored in MinIO.
    pub storage: Option<StorageService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        videos: Arc<dyn VideoStore>,
        progress: Arc<dyn ProgressStore>,
        transcoder: TranscodeDispatcher,
        storage: Option<StorageService>,
    ) -> Self {
        Self {
            config,
            videos,
            progress,
            transcoder,
            storage,
        }
    }
}
