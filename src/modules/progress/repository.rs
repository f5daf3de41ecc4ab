use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{ProgressUpdate, WatchProgress};

/// Keyed by `(user_id, video_id)`. Writes to one pair apply in arrival
/// order; the last one wins.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(&self, user_id: Uuid, video_id: Uuid) -> Result<Option<WatchProgress>>;

    /// Every record of one user.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<WatchProgress>>;

    async fn upsert(&self, user_id: Uuid, video_id: Uuid, update: ProgressUpdate) -> Result<WatchProgress>;
}

#[derive(Clone)]
pub struct ProgressRepository {
    pool: PgPool,
}

impl ProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for ProgressRepository {
    async fn get(&self, user_id: Uuid, video_id: Uuid) -> Result<Option<WatchProgress>> {
        let progress = sqlx::query_as::<_, WatchProgress>(
            r#"
            SELECT user_id, video_id, position_seconds, viewed, updated_at
            FROM video_progress
            WHERE user_id = $1 AND video_id = $2
            "#,
        )
        .bind(user_id)
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(progress)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<WatchProgress>> {
        let progress = sqlx::query_as::<_, WatchProgress>(
            r#"
            SELECT user_id, video_id, position_seconds, viewed, updated_at
            FROM video_progress
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(progress)
    }

    async fn upsert(&self, user_id: Uuid, video_id: Uuid, update: ProgressUpdate) -> Result<WatchProgress> {
        let progress = sqlx::query_as::<_, WatchProgress>(
            r#"
            INSERT INTO video_progress (user_id, video_id, position_seconds, viewed)
            VALUES ($1, $2, COALESCE($3::float8, 0), COALESCE($4::bool, FALSE))
            ON CONFLICT (user_id, video_id) DO UPDATE
            SET position_seconds = COALESCE($3::float8, video_progress.position_seconds),
                viewed = COALESCE($4::bool, video_progress.viewed),
                updated_at = NOW()
            RETURNING user_id, video_id, position_seconds, viewed, updated_at
            "#,
        )
        .bind(user_id)
        .bind(video_id)
        .bind(update.position_seconds)
        .bind(update.viewed)
        .fetch_one(&self.pool)
        .await?;
        Ok(progress)
    }
}
