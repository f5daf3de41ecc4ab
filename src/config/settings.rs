use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;

use crate::config::env::{self, EnvKey};
use crate::transcode::ladder::LADDER;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum GuardBackend {
    Memory,
    Redis,
}

impl FromStr for GuardBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(GuardBackend::Memory),
            "redis" => Ok(GuardBackend::Redis),
            other => Err(anyhow!("Unknown job guard backend '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum SourceBackend {
    Local,
    S3,
}

impl FromStr for SourceBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SourceBackend::Local),
            "s3" | "minio" => Ok(SourceBackend::S3),
            other => Err(anyhow!("Unknown source backend '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct MinioConfig {
    pub url: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TranscodeConfig {
    pub ffmpeg_bin: String,
    pub workers: usize,
    pub encoder_timeout: Duration,
    pub segment_seconds: u32,
    pub guard_backend: GuardBackend,
    pub guard_ttl: Duration,
    pub reconcile_cron: String,
    pub stale_after: Duration,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub public_base_url: String,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub rabbitmq_url: Option<String>,
    pub jwt_secret: String,
    pub media_root: PathBuf,
    pub source_backend: SourceBackend,
    pub minio: Option<MinioConfig>,
    pub transcode: TranscodeConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let minio = match (
            env::get_opt(EnvKey::MinioUrl),
            env::get_opt(EnvKey::MinioBucket),
            env::get_opt(EnvKey::MinioAccessKey),
            env::get_opt(EnvKey::MinioSecretKey),
        ) {
            (Some(url), Some(bucket), Some(access_key), Some(secret_key)) => Some(MinioConfig {
                url,
                bucket,
                access_key,
                secret_key,
            }),
            _ => None,
        };

        let rabbitmq_url = env::get_opt(EnvKey::RabbitMqUrl);
        // Workers on a shared broker queue need a guard every replica sees.
        let default_guard = if rabbitmq_url.is_some() { "redis" } else { "memory" };

        let encoder_timeout_secs = env::get_parsed(EnvKey::EncoderTimeoutSecs, 3600u64);
        let guard_ttl_secs = env::get_parsed(
            EnvKey::JobGuardTtlSecs,
            default_guard_ttl_secs(encoder_timeout_secs, LADDER.len()),
        );

        let config = Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            public_base_url: env::get_or(EnvKey::PublicBaseUrl, "http://127.0.0.1:3000")
                .trim_end_matches('/')
                .to_string(),
            database_url: env::get(EnvKey::DatabaseUrl)
                .map_err(|_| anyhow!("DATABASE_URL must be set"))?,
            redis_url: env::get_opt(EnvKey::RedisUrl),
            rabbitmq_url,
            jwt_secret: env::get(EnvKey::JwtSecret).map_err(|_| anyhow!("JWT_SECRET must be set"))?,
            media_root: PathBuf::from(env::get_or(EnvKey::MediaRoot, "media")),
            source_backend: env::get_or(EnvKey::SourceBackend, "local").parse()?,
            minio,
            transcode: TranscodeConfig {
                ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, "ffmpeg"),
                workers: env::get_parsed(EnvKey::TranscodeWorkers, 2usize).max(1),
                encoder_timeout: Duration::from_secs(encoder_timeout_secs),
                segment_seconds: env::get_parsed(EnvKey::SegmentSeconds, 10u32).max(1),
                guard_backend: env::get_or(EnvKey::JobGuardBackend, default_guard).parse()?,
                guard_ttl: Duration::from_secs(guard_ttl_secs),
                reconcile_cron: env::get_or(EnvKey::ReconcileCron, "0 */5 * * * *"),
                stale_after: Duration::from_secs(env::get_parsed(
                    EnvKey::StaleEncodingSecs,
                    guard_ttl_secs,
                )),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.transcode.guard_backend == GuardBackend::Redis && self.redis_url.is_none() {
            bail!("JOB_GUARD_BACKEND=redis requires REDIS_URL");
        }
        if self.transcode.guard_backend == GuardBackend::Memory && self.rabbitmq_url.is_some() {
            bail!("RABBITMQ_URL requires JOB_GUARD_BACKEND=redis; a process-local guard is not shared by other consumers");
        }
        if self.source_backend == SourceBackend::S3 && self.minio.is_none() {
            bail!("SOURCE_BACKEND=s3 requires MINIO_ENDPOINT, MINIO_BUCKET_VIDEOS and credentials");
        }
        cron::Schedule::from_str(&self.transcode.reconcile_cron)
            .map_err(|e| anyhow!("Invalid RECONCILE_CRON '{}': {}", self.transcode.reconcile_cron, e))?;
        Ok(())
    }

    /// Public URL of a path relative to the media root.
    pub fn media_url(&self, relative: &str) -> String {
        format!("{}/media/{}", self.public_base_url, relative.trim_start_matches('/'))
    }
}

/// A guard marker has to outlive the slowest legitimate run: every rendition
/// hitting the encoder timeout, plus slack for fetch and publish.
fn default_guard_ttl_secs(encoder_timeout_secs: u64, renditions: usize) -> u64 {
    encoder_timeout_secs
        .saturating_mul(renditions as u64)
        .saturating_add(300)
}
