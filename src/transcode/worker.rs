use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};

use super::encoder::{Encoder, RenditionTarget};
use super::error::{FailureReason, JobOutcome, TranscodeError};
use super::ladder::{default_ladder, Rendition};
use super::manifest::{self, RenditionOutput};
use super::publish::{CompletionUpdater, HlsLayout};
use super::source::SourceStore;
use crate::modules::video::events::TranscodeJob;
use crate::modules::video::model::{Video, VideoStatus};
use crate::modules::video::repository::VideoStore;

/// Executes one transcode job end to end.
pub struct TranscodeWorker {
    videos: Arc<dyn VideoStore>,
    sources: Arc<dyn SourceStore>,
    encoder: Arc<dyn Encoder>,
    layout: HlsLayout,
    completion: CompletionUpdater,
    ladder: Vec<Rendition>,
    encoder_timeout: Duration,
}

impl TranscodeWorker {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        sources: Arc<dyn SourceStore>,
        encoder: Arc<dyn Encoder>,
        layout: HlsLayout,
        encoder_timeout: Duration,
    ) -> Self {
        Self {
            completion: CompletionUpdater::new(videos.clone()),
            videos,
            sources,
            encoder,
            layout,
            ladder: default_ladder(),
            encoder_timeout,
        }
    }

    pub fn with_ladder(mut self, ladder: Vec<Rendition>) -> Self {
        self.ladder = ladder;
        self
    }

    pub async fn run(&self, job: &TranscodeJob) -> JobOutcome {
        let span = info_span!("transcode", video_id = %job.video_id, attempt = job.attempt);
        self.run_inner(job).instrument(span).await
    }

    async fn run_inner(&self, job: &TranscodeJob) -> JobOutcome {
        let video_id = job.video_id;

        let video = match self.videos.find(video_id).await {
            Ok(Some(video)) => video,
            Ok(None) => {
                warn!("Video record vanished before transcoding started");
                return JobOutcome::from(&TranscodeError::SourceNotFound(format!("video {}", video_id)));
            }
            Err(e) => {
                error!(error = %e, "Could not load video record");
                return JobOutcome::Failed {
                    reason: FailureReason::StorageError,
                    detail: e.to_string(),
                };
            }
        };

        let run_dir = match self.layout.create_run_dir(video_id, job.attempt).await {
            Ok(dir) => dir,
            Err(e) => {
                let err = TranscodeError::Storage(e);
                self.completion.record_failure(video_id, &err).await;
                return JobOutcome::from(&err);
            }
        };
        let scratch = run_dir.with_extension("source");

        let result = self.execute(&video, &run_dir, &scratch).await;

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %scratch.display(), error = %e, "Failed to remove source copy");
            }
        }

        match result {
            Ok(manifest_location) => {
                self.layout.prune_superseded(video_id, &run_dir).await;
                info!(manifest = %manifest_location, "✅ Video ready");
                JobOutcome::Ready { manifest_location }
            }
            // Already promoted and status restored; files stay for the sweep.
            Err(err @ TranscodeError::Publish(_)) => JobOutcome::from(&err),
            Err(err) => {
                warn!(reason = %err.reason(), error = %err, "❌ Transcode failed");
                self.layout.discard(&run_dir).await;
                self.completion.record_failure(video_id, &err).await;
                JobOutcome::from(&err)
            }
        }
    }

    async fn execute(
        &self,
        video: &Video,
        run_dir: &Path,
        scratch: &Path,
    ) -> Result<String, TranscodeError> {
        let previous: (VideoStatus, Option<String>) = (video.status, video.failure_reason.clone());

        let source: PathBuf = self.sources.resolve(&video.source_location, scratch).await?;

        self.videos
            .mark_encoding(video.id)
            .await
            .map_err(TranscodeError::Store)?;

        let mut outputs = Vec::with_capacity(self.ladder.len());
        for (index, rendition) in self.ladder.iter().enumerate() {
            let output = self.encode_rendition(&source, index, rendition, run_dir).await?;
            outputs.push(output);
        }

        manifest::write_master(run_dir, &outputs).await?;
        self.layout.promote(video.id, run_dir).await?;

        let manifest_location = HlsLayout::manifest_location(video.id);
        self.completion
            .publish(video.id, &manifest_location, previous)
            .await?;

        Ok(manifest_location)
    }

    async fn encode_rendition(
        &self,
        source: &Path,
        index: usize,
        rendition: &Rendition,
        run_dir: &Path,
    ) -> Result<RenditionOutput, TranscodeError> {
        let target = RenditionTarget::new(index, run_dir);
        let label = rendition.resolution();

        match tokio::time::timeout(
            self.encoder_timeout,
            self.encoder.encode(source, rendition, &target),
        )
        .await
        {
            Err(_) => {
                return Err(TranscodeError::EncodingTimeout {
                    rendition: label,
                    after: self.encoder_timeout,
                });
            }
            Ok(Err(e)) => {
                return Err(TranscodeError::Encoding {
                    rendition: label,
                    reason: e.to_string(),
                });
            }
            Ok(Ok(())) => {}
        }

        let segments = target.list_segments().await?;
        if segments.is_empty() {
            return Err(TranscodeError::Encoding {
                rendition: label,
                reason: "encoder produced no segments".to_string(),
            });
        }

        info!(rendition = %label, segments = segments.len(), "Rendition encoded");
        Ok(RenditionOutput {
            rendition: *rendition,
            segments,
            child_manifest: target.playlist_name(),
        })
    }
}
