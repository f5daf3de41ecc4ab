use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

use crate::infrastructure::redis::client::RedisService;

/// Registry of in-flight transcodes, at most one per video.
///
/// A successful acquire hands out a lease token. Only the holder of that
/// token can renew or clear the marker, so a run that outlived its marker
/// cannot release the claim of the run that replaced it.
#[async_trait]
pub trait JobGuard: Send + Sync {
    /// Record `video_id` as in flight. Returns the lease, or `None` if the
    /// video is already claimed.
    async fn try_acquire(&self, video_id: Uuid) -> Result<Option<String>>;

    /// Called when a worker picks the job up. Extends the marker held under
    /// `lease`, or re-creates it if it lapsed while queued. Returns `false`
    /// when another lease owns the video.
    async fn renew(&self, video_id: Uuid, lease: &str) -> Result<bool>;

    /// Clear the marker if it is still held under `lease`.
    async fn release(&self, video_id: Uuid, lease: &str) -> Result<()>;

    async fn is_held(&self, video_id: Uuid) -> Result<bool>;
}

fn new_lease() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Process-local guard for single-node deployments.
#[derive(Default)]
pub struct LocalJobGuard {
    in_flight: Mutex<HashMap<Uuid, String>>,
}

impl LocalJobGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, String>>> {
        self.in_flight
            .lock()
            .map_err(|_| anyhow!("in-flight registry poisoned"))
    }
}

#[async_trait]
impl JobGuard for LocalJobGuard {
    async fn try_acquire(&self, video_id: Uuid) -> Result<Option<String>> {
        let mut in_flight = self.lock()?;
        if in_flight.contains_key(&video_id) {
            return Ok(None);
        }
        let lease = new_lease();
        in_flight.insert(video_id, lease.clone());
        Ok(Some(lease))
    }

    async fn renew(&self, video_id: Uuid, lease: &str) -> Result<bool> {
        let mut in_flight = self.lock()?;
        match in_flight.get(&video_id) {
            Some(current) => Ok(current == lease),
            None => {
                in_flight.insert(video_id, lease.to_string());
                Ok(true)
            }
        }
    }

    async fn release(&self, video_id: Uuid, lease: &str) -> Result<()> {
        let mut in_flight = self.lock()?;
        if in_flight.get(&video_id).is_some_and(|current| current == lease) {
            in_flight.remove(&video_id);
        }
        Ok(())
    }

    async fn is_held(&self, video_id: Uuid) -> Result<bool> {
        Ok(self.lock()?.contains_key(&video_id))
    }
}

const RENEW_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == ARGV[1] then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
    return 1
elseif not current then
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
    return 1
end
return 0
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Guard shared by every worker process talking to the same Redis.
///
/// Markers expire after `ttl` so a crashed worker cannot pin a video
/// forever. The TTL restarts when a worker picks the job up, so it has to
/// outlast one run, not the queue wait.
#[derive(Clone)]
pub struct RedisJobGuard {
    redis: RedisService,
    ttl: Duration,
}

impl RedisJobGuard {
    pub fn new(redis: RedisService, ttl: Duration) -> Self {
        Self { redis, ttl }
    }

    fn key(video_id: Uuid) -> String {
        format!("transcode:inflight:{}", video_id)
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait]
impl JobGuard for RedisJobGuard {
    async fn try_acquire(&self, video_id: Uuid) -> Result<Option<String>> {
        let mut conn = self.redis.get_conn().await?;
        let lease = new_lease();
        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::key(video_id))
            .arg(&lease)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs())
            .query_async(&mut conn)
            .await?;
        Ok(reply.map(|_| lease))
    }

    async fn renew(&self, video_id: Uuid, lease: &str) -> Result<bool> {
        let mut conn = self.redis.get_conn().await?;
        let renewed: i64 = Script::new(RENEW_SCRIPT)
            .key(Self::key(video_id))
            .arg(lease)
            .arg(self.ttl_secs())
            .invoke_async(&mut conn)
            .await?;
        Ok(renewed == 1)
    }

    async fn release(&self, video_id: Uuid, lease: &str) -> Result<()> {
        let mut conn = self.redis.get_conn().await?;
        let _: i64 = Script::new(RELEASE_SCRIPT)
            .key(Self::key(video_id))
            .arg(lease)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn is_held(&self, video_id: Uuid) -> Result<bool> {
        let mut conn = self.redis.get_conn().await?;
        let held: bool = conn.exists(Self::key(video_id)).await?;
        Ok(held)
    }
}
