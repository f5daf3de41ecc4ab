use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "video_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    Uploaded,
    Encoding,
    Ready,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "UPLOADED",
            VideoStatus::Encoding => "ENCODING",
            VideoStatus::Ready => "READY",
            VideoStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, ToSchema)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub source_location: String,
    pub thumbnail_location: Option<String>,
    /// Relative to the media root; kept across failed re-encodes.
    pub master_manifest_location: Option<String>,
    pub status: VideoStatus,
    pub failure_reason: Option<String>,
    pub transcode_attempts: i32,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl Video {
    /// The manifest a player may be pointed at. Only a `Ready` video has one.
    pub fn playable_manifest(&self) -> Option<&str> {
        match self.status {
            VideoStatus::Ready => self.master_manifest_location.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: Option<String>,
    pub source_location: String,
    pub thumbnail_location: Option<String>,
}
