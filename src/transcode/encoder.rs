use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use super::ladder::Rendition;

/// Where one rendition's encode writes its child playlist and segments.
#[derive(Debug, Clone)]
pub struct RenditionTarget {
    /// Position of the rendition in the ladder.
    pub index: usize,
    /// The run directory, shared by all renditions of a run.
    pub dir: PathBuf,
}

impl RenditionTarget {
    pub fn new(index: usize, dir: impl Into<PathBuf>) -> Self {
        Self {
            index,
            dir: dir.into(),
        }
    }

    pub fn playlist_name(&self) -> String {
        format!("variant_{}.m3u8", self.index)
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.dir.join(self.playlist_name())
    }

    pub fn segment_prefix(&self) -> String {
        format!("segment_{}_", self.index)
    }

    /// printf-style pattern handed to the muxer, e.g. `segment_2_%03d.ts`.
    pub fn segment_pattern(&self) -> PathBuf {
        self.dir.join(format!("segment_{}_%03d.ts", self.index))
    }

    /// Segment files this rendition produced, sorted by sequence number.
    pub async fn list_segments(&self) -> io::Result<Vec<String>> {
        let prefix = self.segment_prefix();
        let mut segments = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".ts") {
                segments.push(name);
            }
        }
        segments.sort();
        Ok(segments)
    }
}

#[derive(Debug, Error)]
pub enum EncodeFailure {
    #[error("failed to start encoder: {0}")]
    Spawn(#[source] io::Error),

    #[error("encoder exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("encoder i/o error: {0}")]
    Io(#[from] io::Error),
}

/// The external encoding tool, one invocation per rendition.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(
        &self,
        input: &Path,
        rendition: &Rendition,
        target: &RenditionTarget,
    ) -> Result<(), EncodeFailure>;
}

const STDERR_TAIL_LINES: usize = 20;

/// Drives an `ffmpeg` binary to produce an HLS rendition.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    bin: String,
    segment_seconds: u32,
}

impl FfmpegEncoder {
    pub fn new(bin: impl Into<String>, segment_seconds: u32) -> Self {
        Self {
            bin: bin.into(),
            segment_seconds,
        }
    }

    fn args(&self, input: &Path, rendition: &Rendition, target: &RenditionTarget) -> Vec<String> {
        let kbps = rendition.bitrate_kbps;
        vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            input.display().to_string(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "0:a:0?".into(),
            "-vf".into(),
            format!("scale=w={}:h={}", rendition.width, rendition.height),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "fast".into(),
            "-b:v".into(),
            format!("{kbps}k"),
            "-maxrate".into(),
            format!("{kbps}k"),
            "-bufsize".into(),
            format!("{}k", kbps * 2),
            // Keyframe on every segment boundary so renditions stay switchable.
            "-force_key_frames".into(),
            format!("expr:gte(t,n_forced*{})", self.segment_seconds),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "128k".into(),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.segment_seconds.to_string(),
            "-hls_list_size".into(),
            "0".into(),
            "-hls_playlist_type".into(),
            "vod".into(),
            "-hls_segment_filename".into(),
            target.segment_pattern().display().to_string(),
            target.playlist_path().display().to_string(),
        ]
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(
        &self,
        input: &Path,
        rendition: &Rendition,
        target: &RenditionTarget,
    ) -> Result<(), EncodeFailure> {
        let args = self.args(input, rendition, target);
        debug!(bin = %self.bin, ?args, "Spawning encoder");
        info!(rendition = %rendition.resolution(), bitrate_kbps = rendition.bitrate_kbps, "🎬 Encoding rendition");

        // Dropping the future (worker timeout) kills the child.
        let child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EncodeFailure::Spawn)?;

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(EncodeFailure::Exit {
                status: output.status.to_string(),
                stderr: tail,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::ladder::LADDER;

    #[test]
    fn ffmpeg_args_carry_rendition_contract() {
        let encoder = FfmpegEncoder::new("ffmpeg", 10);
        let target = RenditionTarget::new(2, "/tmp/run");
        let args = encoder.args(Path::new("/tmp/in.mp4"), &LADDER[2], &target);

        let after = |flag: &str| {
            let i = args.iter().position(|a| a == flag).unwrap();
            args[i + 1].clone()
        };
        assert_eq!(after("-vf"), "scale=w=1280:h=720");
        assert_eq!(after("-b:v"), "2500k");
        assert_eq!(after("-hls_time"), "10");
        assert_eq!(after("-hls_segment_filename"), "/tmp/run/segment_2_%03d.ts");
        assert_eq!(args.last().unwrap(), "/tmp/run/variant_2.m3u8");
    }

    #[tokio::test]
    async fn lists_only_this_renditions_segments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["segment_1_001.ts", "segment_1_000.ts", "segment_0_000.ts", "variant_1.m3u8"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let target = RenditionTarget::new(1, dir.path());
        assert_eq!(
            target.list_segments().await.unwrap(),
            vec!["segment_1_000.ts".to_string(), "segment_1_001.ts".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg-binary", 10);
        let err = encoder
            .encode(Path::new("in.mp4"), &LADDER[0], &RenditionTarget::new(0, dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeFailure::Spawn(_)));
    }
}
