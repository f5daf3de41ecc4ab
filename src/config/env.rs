use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    PublicBaseUrl,
    DatabaseUrl,
    RedisUrl,
    RabbitMqUrl,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    JwtSecret,
    MediaRoot,
    FfmpegBin,
    TranscodeWorkers,
    EncoderTimeoutSecs,
    SegmentSeconds,
    JobGuardBackend,
    JobGuardTtlSecs,
    SourceBackend,
    ReconcileCron,
    StaleEncodingSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::PublicBaseUrl => "PUBLIC_BASE_URL",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::MediaRoot => "MEDIA_ROOT",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
            EnvKey::TranscodeWorkers => "TRANSCODE_WORKERS",
            EnvKey::EncoderTimeoutSecs => "ENCODER_TIMEOUT_SECS",
            EnvKey::SegmentSeconds => "SEGMENT_SECONDS",
            EnvKey::JobGuardBackend => "JOB_GUARD_BACKEND",
            EnvKey::JobGuardTtlSecs => "JOB_GUARD_TTL_SECS",
            EnvKey::SourceBackend => "SOURCE_BACKEND",
            EnvKey::ReconcileCron => "RECONCILE_CRON",
            EnvKey::StaleEncodingSecs => "STALE_ENCODING_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

/// Unset and empty variables both read as `None`.
pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
