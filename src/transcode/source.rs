use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::error::TranscodeError;
use crate::infrastructure::storage::s3::StorageService;

/// Resolves a video's `source_location` into a file the encoder can read.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// `scratch` is a path the store may write a local copy to; the worker
    /// removes it when the run ends.
    async fn resolve(&self, location: &str, scratch: &Path) -> Result<PathBuf, TranscodeError>;
}

/// Sources stored as files under the media root.
#[derive(Debug, Clone)]
pub struct LocalSourceStore {
    media_root: PathBuf,
}

impl LocalSourceStore {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }
}

#[async_trait]
impl SourceStore for LocalSourceStore {
    async fn resolve(&self, location: &str, _scratch: &Path) -> Result<PathBuf, TranscodeError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(TranscodeError::SourceNotFound("empty source location".into()));
        }

        let candidate = Path::new(location);
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.media_root.join(candidate)
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(TranscodeError::SourceNotFound(path.display().to_string())),
        }
    }
}

/// Sources uploaded to the MinIO videos bucket; fetched into the scratch
/// path before encoding.
#[derive(Clone)]
pub struct S3SourceStore {
    storage: StorageService,
}

impl S3SourceStore {
    pub fn new(storage: StorageService) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SourceStore for S3SourceStore {
    async fn resolve(&self, location: &str, scratch: &Path) -> Result<PathBuf, TranscodeError> {
        let key = location.trim();
        if key.is_empty() {
            return Err(TranscodeError::SourceNotFound("empty source location".into()));
        }

        info!("⬇️ Downloading source from S3: {}", key);
        match self.storage.download_to_file(key, scratch).await {
            Ok(Some(bytes)) => {
                info!("⬇️ Downloaded {} bytes", bytes);
                Ok(scratch.to_path_buf())
            }
            Ok(None) => Err(TranscodeError::SourceNotFound(format!(
                "{}/{}",
                self.storage.bucket, key
            ))),
            Err(e) => Err(TranscodeError::Storage(std::io::Error::other(format!(
                "Failed to download from S3: {}",
                e
            )))),
        }
    }
}
