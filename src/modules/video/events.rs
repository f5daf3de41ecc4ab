use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Queue message asking for one transcode run of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub video_id: Uuid,
    pub attempt: i32,
    /// Guard lease taken at submission; the worker renews and releases it.
    pub lease: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

impl TranscodeJob {
    pub fn new(video_id: Uuid, attempt: i32, lease: impl Into<String>) -> Self {
        Self {
            video_id,
            attempt,
            lease: lease.into(),
            submitted_at: OffsetDateTime::now_utc(),
        }
    }
}
