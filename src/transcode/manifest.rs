use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::TranscodeError;
use super::ladder::Rendition;

pub const MASTER_MANIFEST: &str = "master.m3u8";

/// What one rendition encode left behind in the run directory.
#[derive(Debug, Clone)]
pub struct RenditionOutput {
    pub rendition: Rendition,
    pub segments: Vec<String>,
    /// Child playlist file name, relative to the run directory.
    pub child_manifest: String,
}

/// Render the master playlist text. Entries follow the order of `outputs`,
/// which the worker keeps in ladder order.
pub fn build_master(outputs: &[RenditionOutput]) -> Result<String, TranscodeError> {
    if outputs.is_empty() {
        return Err(TranscodeError::ManifestAssembly(
            "no renditions to reference".to_string(),
        ));
    }

    let mut text = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for output in outputs {
        if output.child_manifest.trim().is_empty() {
            return Err(TranscodeError::ManifestAssembly(format!(
                "rendition {} has no child manifest",
                output.rendition.resolution()
            )));
        }
        text.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}\n",
            output.rendition.bandwidth_bps(),
            output.rendition.resolution(),
            output.child_manifest
        ));
    }

    Ok(text)
}

/// Write `master.m3u8` into `dir`, refusing to reference a child playlist
/// that is not on disk.
pub async fn write_master(dir: &Path, outputs: &[RenditionOutput]) -> Result<PathBuf, TranscodeError> {
    let text = build_master(outputs)?;

    for output in outputs {
        let child = dir.join(&output.child_manifest);
        let present = tokio::fs::metadata(&child)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !present {
            return Err(TranscodeError::ManifestAssembly(format!(
                "child manifest {} is missing",
                child.display()
            )));
        }
    }

    let path = dir.join(MASTER_MANIFEST);
    tokio::fs::write(&path, text).await?;
    debug!(path = %path.display(), renditions = outputs.len(), "Master manifest written");
    Ok(path)
}
