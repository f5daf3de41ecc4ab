//! In-memory stand-ins for Postgres and ffmpeg, shared by the integration
//! tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use time::OffsetDateTime;
use uuid::Uuid;

use videoflix_backend::config::settings::{AppConfig, GuardBackend, SourceBackend, TranscodeConfig};
use videoflix_backend::middleware::auth::TokenClaims;
use videoflix_backend::modules::progress::model::{ProgressUpdate, WatchProgress};
use videoflix_backend::modules::progress::repository::ProgressStore;
use videoflix_backend::modules::video::model::{NewVideo, Video, VideoStatus};
use videoflix_backend::modules::video::repository::VideoStore;
use videoflix_backend::state::AppState;
use videoflix_backend::transcode::encoder::{EncodeFailure, Encoder, RenditionTarget};
use videoflix_backend::transcode::guard::{JobGuard, LocalJobGuard};
use videoflix_backend::transcode::ladder::Rendition;
use videoflix_backend::transcode::publish::HlsLayout;
use videoflix_backend::transcode::source::LocalSourceStore;
use videoflix_backend::transcode::{FailureReason, LocalJobQueue, TranscodeDispatcher, TranscodeWorker};

pub const JWT_SECRET: &str = "test-secret";

// ---------------------------------------------------------------------------
// Video store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryVideoStore {
    videos: Mutex<HashMap<Uuid, Video>>,
    transitions: Mutex<Vec<(Uuid, VideoStatus)>>,
    fail_publish: AtomicBool,
}

impl MemoryVideoStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, video: Video) {
        self.videos.lock().unwrap().insert(video.id, video);
    }

    pub fn snapshot(&self, id: Uuid) -> Option<Video> {
        self.videos.lock().unwrap().get(&id).cloned()
    }

    /// Every status written for `id`, in order.
    pub fn transitions(&self, id: Uuid) -> Vec<VideoStatus> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(vid, _)| *vid == id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Pretend the row was last touched `ago` in the past.
    pub fn age(&self, id: Uuid, ago: Duration) {
        if let Some(video) = self.videos.lock().unwrap().get_mut(&id) {
            video.updated_at = OffsetDateTime::now_utc() - ago;
        }
    }

    fn update<F>(&self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut Video),
    {
        let mut videos = self.videos.lock().unwrap();
        let video = videos.get_mut(&id).ok_or_else(|| anyhow!("video {} not found", id))?;
        f(video);
        video.updated_at = OffsetDateTime::now_utc();
        self.transitions.lock().unwrap().push((id, video.status));
        Ok(())
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn create(&self, video: NewVideo) -> Result<Video> {
        let now = OffsetDateTime::now_utc();
        let created = Video {
            id: Uuid::new_v4(),
            title: video.title,
            description: video.description,
            source_location: video.source_location,
            thumbnail_location: video.thumbnail_location,
            master_manifest_location: None,
            status: VideoStatus::Uploaded,
            failure_reason: None,
            transcode_attempts: 0,
            created_at: now,
            updated_at: now,
        };
        self.insert(created.clone());
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Video>> {
        Ok(self.snapshot(id))
    }

    async fn list(&self) -> Result<Vec<Video>> {
        let mut videos: Vec<Video> = self.videos.lock().unwrap().values().cloned().collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn next_attempt(&self, id: Uuid) -> Result<Option<i32>> {
        let mut videos = self.videos.lock().unwrap();
        Ok(videos.get_mut(&id).map(|video| {
            video.transcode_attempts += 1;
            video.transcode_attempts
        }))
    }

    async fn mark_encoding(&self, id: Uuid) -> Result<()> {
        self.update(id, |video| {
            video.status = VideoStatus::Encoding;
            video.failure_reason = None;
        })
    }

    async fn publish_ready(&self, id: Uuid, manifest_location: &str) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(anyhow!("database unavailable"));
        }
        self.update(id, |video| {
            video.status = VideoStatus::Ready;
            video.master_manifest_location = Some(manifest_location.to_string());
            video.failure_reason = None;
        })
    }

    async fn mark_failed(&self, id: Uuid, reason: FailureReason) -> Result<()> {
        self.update(id, |video| {
            video.status = VideoStatus::Failed;
            video.failure_reason = Some(reason.as_str().to_string());
        })
    }

    async fn fail_if_encoding(&self, id: Uuid, reason: FailureReason) -> Result<bool> {
        let encoding = matches!(self.snapshot(id), Some(v) if v.status == VideoStatus::Encoding);
        if !encoding {
            return Ok(false);
        }
        self.mark_failed(id, reason).await?;
        Ok(true)
    }

    async fn restore_status(&self, id: Uuid, status: VideoStatus, failure_reason: Option<String>) -> Result<()> {
        self.update(id, |video| {
            video.status = status;
            video.failure_reason = failure_reason;
        })
    }

    async fn list_stale_encoding(&self, before: OffsetDateTime) -> Result<Vec<Uuid>> {
        Ok(self
            .videos
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.status == VideoStatus::Encoding && v.updated_at < before)
            .map(|v| v.id)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Progress store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryProgressStore {
    records: Mutex<HashMap<(Uuid, Uuid), WatchProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn get(&self, user_id: Uuid, video_id: Uuid) -> Result<Option<WatchProgress>> {
        Ok(self.records.lock().unwrap().get(&(user_id, video_id)).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<WatchProgress>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, user_id: Uuid, video_id: Uuid, update: ProgressUpdate) -> Result<WatchProgress> {
        let mut records = self.records.lock().unwrap();
        let record = records.entry((user_id, video_id)).or_insert_with(|| WatchProgress {
            user_id,
            video_id,
            position_seconds: 0.0,
            viewed: false,
            updated_at: OffsetDateTime::now_utc(),
        });
        if let Some(position) = update.position_seconds {
            record.position_seconds = position;
        }
        if let Some(viewed) = update.viewed {
            record.viewed = viewed;
        }
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Writes a child playlist and `segments` dummy `.ts` files per rendition.
pub struct FakeEncoder {
    segments: usize,
    fail_at: Option<usize>,
    fail_first_call: bool,
    empty_at: Option<usize>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    observer: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self {
            segments: 3,
            fail_at: None,
            fail_first_call: false,
            empty_at: None,
            delay: None,
            calls: AtomicUsize::new(0),
            observer: None,
        }
    }

    /// Exit non-zero on the rendition at `index`.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Exit non-zero on the very first invocation only.
    pub fn failing_once(mut self) -> Self {
        self.fail_first_call = true;
        self
    }

    /// Succeed on `index` without writing any segment.
    pub fn empty_at(mut self, index: usize) -> Self {
        self.empty_at = Some(index);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Called with the rendition index before each encode.
    pub fn observing(mut self, observer: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, input: &Path, _rendition: &Rendition, target: &RenditionTarget) -> Result<(), EncodeFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(observer) = &self.observer {
            observer(target.index);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !input.is_file() {
            return Err(EncodeFailure::Exit {
                status: "exit status: 1".into(),
                stderr: format!("{}: No such file or directory", input.display()),
            });
        }
        if self.fail_at == Some(target.index) || (self.fail_first_call && call == 0) {
            return Err(EncodeFailure::Exit {
                status: "exit status: 1".into(),
                stderr: "Conversion failed!".into(),
            });
        }

        let count = if self.empty_at == Some(target.index) { 0 } else { self.segments };
        let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n");
        for seq in 0..count {
            let name = format!("{}{:03}.ts", target.segment_prefix(), seq);
            tokio::fs::write(target.dir.join(&name), b"ts").await?;
            playlist.push_str(&format!("#EXTINF:10.0,\n{}\n", name));
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(target.playlist_path(), playlist).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub const SOURCE_LOCATION: &str = "videos/originals/sample.mp4";

/// A video in `Uploaded` whose source exists under `media_root`.
pub async fn seed_video(store: &MemoryVideoStore, media_root: &Path) -> Uuid {
    let source = media_root.join(SOURCE_LOCATION);
    tokio::fs::create_dir_all(source.parent().unwrap()).await.unwrap();
    tokio::fs::write(&source, b"not really a video").await.unwrap();

    let now = OffsetDateTime::now_utc();
    let video = Video {
        id: Uuid::new_v4(),
        title: "Sample".into(),
        description: Some("A sample upload".into()),
        source_location: SOURCE_LOCATION.into(),
        thumbnail_location: None,
        master_manifest_location: None,
        status: VideoStatus::Uploaded,
        failure_reason: None,
        transcode_attempts: 0,
        created_at: now,
        updated_at: now,
    };
    let id = video.id;
    store.insert(video);
    id
}

pub fn worker(store: Arc<MemoryVideoStore>, encoder: Arc<FakeEncoder>, media_root: &Path) -> TranscodeWorker {
    worker_with_timeout(store, encoder, media_root, Duration::from_secs(30))
}

pub fn worker_with_timeout(
    store: Arc<MemoryVideoStore>,
    encoder: Arc<FakeEncoder>,
    media_root: &Path,
    timeout: Duration,
) -> TranscodeWorker {
    TranscodeWorker::new(
        store,
        Arc::new(LocalSourceStore::new(media_root)),
        encoder,
        HlsLayout::new(media_root),
        timeout,
    )
}

pub fn published_master(media_root: &Path, id: Uuid) -> PathBuf {
    media_root.join(HlsLayout::manifest_location(id))
}

pub fn test_config(media_root: &Path) -> AppConfig {
    AppConfig {
        server_port: 0,
        public_base_url: "http://cdn.test".into(),
        database_url: "postgres://unused".into(),
        redis_url: None,
        rabbitmq_url: None,
        jwt_secret: JWT_SECRET.into(),
        media_root: media_root.to_path_buf(),
        source_backend: SourceBackend::Local,
        minio: None,
        transcode: TranscodeConfig {
            ffmpeg_bin: "ffmpeg".into(),
            workers: 1,
            encoder_timeout: Duration::from_secs(30),
            segment_seconds: 10,
            guard_backend: GuardBackend::Memory,
            guard_ttl: Duration::from_secs(600),
            reconcile_cron: "0 */5 * * * *".into(),
            stale_after: Duration::from_secs(600),
        },
    }
}

/// App state over in-memory stores. Submitted jobs land in the returned
/// receiver instead of a worker pool.
pub struct TestApp {
    pub state: AppState,
    pub videos: Arc<MemoryVideoStore>,
    pub progress: Arc<MemoryProgressStore>,
    pub guard: Arc<LocalJobGuard>,
    pub jobs: async_channel::Receiver<videoflix_backend::modules::video::events::TranscodeJob>,
}

impl TestApp {
    pub fn new(media_root: &Path) -> Self {
        let videos = MemoryVideoStore::new();
        let progress = MemoryProgressStore::new();
        let guard = Arc::new(LocalJobGuard::new());
        let (tx, jobs) = async_channel::bounded(16);

        let dispatcher = TranscodeDispatcher::new(
            guard.clone() as Arc<dyn JobGuard>,
            Arc::new(LocalJobQueue::new(tx)),
            videos.clone(),
        );
        let state = AppState::new(test_config(media_root), videos.clone(), progress.clone(), dispatcher, None);

        Self {
            state,
            videos,
            progress,
            guard,
            jobs,
        }
    }
}

pub fn token(role: &str) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
    let claims = TokenClaims {
        sub: user_id,
        role: role.into(),
        iat: now,
        exp: now + 3600,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap();
    (user_id, token)
}
