use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewVideo, Video, VideoStatus};
use crate::transcode::error::FailureReason;

/// Persistence of the video lifecycle. Every status change is a single
/// statement so a reader never sees a half-applied transition.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create(&self, video: NewVideo) -> Result<Video>;

    async fn find(&self, id: Uuid) -> Result<Option<Video>>;

    async fn list(&self) -> Result<Vec<Video>>;

    /// Bump the attempt counter, returning the new value, or `None` if the
    /// video does not exist.
    async fn next_attempt(&self, id: Uuid) -> Result<Option<i32>>;

    async fn mark_encoding(&self, id: Uuid) -> Result<()>;

    /// Flip to `Ready` and set the manifest location together.
    async fn publish_ready(&self, id: Uuid, manifest_location: &str) -> Result<()>;

    /// Flip to `Failed`. The manifest location is left as it was.
    async fn mark_failed(&self, id: Uuid, reason: FailureReason) -> Result<()>;

    /// Like `mark_failed`, but only if the video is still `Encoding`.
    async fn fail_if_encoding(&self, id: Uuid, reason: FailureReason) -> Result<bool>;

    async fn restore_status(
        &self,
        id: Uuid,
        status: VideoStatus,
        failure_reason: Option<String>,
    ) -> Result<()>;

    async fn list_stale_encoding(&self, before: OffsetDateTime) -> Result<Vec<Uuid>>;
}

const VIDEO_COLUMNS: &str = "id, title, description, source_location, thumbnail_location, \
     master_manifest_location, status, failure_reason, transcode_attempts, created_at, updated_at";

#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for VideoRepository {
    async fn create(&self, video: NewVideo) -> Result<Video> {
        let sql = format!(
            r#"
            INSERT INTO videos (title, description, source_location, thumbnail_location)
            VALUES ($1, $2, $3, $4)
            RETURNING {VIDEO_COLUMNS}
            "#
        );
        let video = sqlx::query_as::<_, Video>(&sql)
            .bind(video.title)
            .bind(video.description)
            .bind(video.source_location)
            .bind(video.thumbnail_location)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to create video: {}", e))?;
        Ok(video)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Video>> {
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1");
        let video = sqlx::query_as::<_, Video>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    async fn list(&self) -> Result<Vec<Video>> {
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos ORDER BY created_at DESC");
        let videos = sqlx::query_as::<_, Video>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(videos)
    }

    async fn next_attempt(&self, id: Uuid) -> Result<Option<i32>> {
        let attempt: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE videos
            SET transcode_attempts = transcode_attempts + 1
            WHERE id = $1
            RETURNING transcode_attempts
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn mark_encoding(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE videos SET status = 'ENCODING', failure_reason = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn publish_ready(&self, id: Uuid, manifest_location: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'READY',
                master_manifest_location = $1,
                failure_reason = NULL,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(manifest_location)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Video {} no longer exists", id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: FailureReason) -> Result<()> {
        sqlx::query(
            "UPDATE videos SET status = 'FAILED', failure_reason = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(reason.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_if_encoding(&self, id: Uuid, reason: FailureReason) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'FAILED', failure_reason = $1, updated_at = NOW()
            WHERE id = $2 AND status = 'ENCODING'
            "#,
        )
        .bind(reason.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_status(
        &self,
        id: Uuid,
        status: VideoStatus,
        failure_reason: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE videos SET status = $1, failure_reason = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(status)
        .bind(failure_reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_stale_encoding(&self, before: OffsetDateTime) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM videos WHERE status = 'ENCODING' AND updated_at < $1",
        )
        .bind(before)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
