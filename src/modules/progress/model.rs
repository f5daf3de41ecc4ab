use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Playback position of one user in one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WatchProgress {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub position_seconds: f64,
    pub viewed: bool,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

/// Partial update; absent fields keep their stored value, or the default
/// (`0.0`, `false`) when the record is created.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressUpdate {
    pub position_seconds: Option<f64>,
    pub viewed: Option<bool>,
}
