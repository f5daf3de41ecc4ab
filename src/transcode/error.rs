use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("source media not found: {0}")]
    SourceNotFound(String),

    #[error("encoder failed for rendition {rendition}: {reason}")]
    Encoding { rendition: String, reason: String },

    #[error("encoder timed out for rendition {rendition} after {}s", after.as_secs())]
    EncodingTimeout { rendition: String, after: Duration },

    #[error("manifest assembly failed: {0}")]
    ManifestAssembly(String),

    #[error("publishing finished asset failed: {0}")]
    Publish(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("video store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl TranscodeError {
    pub fn reason(&self) -> FailureReason {
        match self {
            TranscodeError::SourceNotFound(_) => FailureReason::SourceNotFound,
            TranscodeError::Encoding { .. } => FailureReason::EncodingError,
            TranscodeError::EncodingTimeout { .. } => FailureReason::EncodingTimeout,
            TranscodeError::ManifestAssembly(_) => FailureReason::ManifestAssemblyError,
            TranscodeError::Publish(_) => FailureReason::PublishError,
            TranscodeError::Storage(_) | TranscodeError::Store(_) => FailureReason::StorageError,
        }
    }
}

/// Stable failure code persisted in `videos.failure_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    SourceNotFound,
    EncodingError,
    EncodingTimeout,
    ManifestAssemblyError,
    PublishError,
    StorageError,
    Interrupted,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::SourceNotFound => "SOURCE_NOT_FOUND",
            FailureReason::EncodingError => "ENCODING_ERROR",
            FailureReason::EncodingTimeout => "ENCODING_TIMEOUT",
            FailureReason::ManifestAssemblyError => "MANIFEST_ASSEMBLY_ERROR",
            FailureReason::PublishError => "PUBLISH_ERROR",
            FailureReason::StorageError => "STORAGE_ERROR",
            FailureReason::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one run. Every run ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Ready { manifest_location: String },
    Failed { reason: FailureReason, detail: String },
}

impl JobOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, JobOutcome::Ready { .. })
    }
}

impl From<&TranscodeError> for JobOutcome {
    fn from(err: &TranscodeError) -> Self {
        JobOutcome::Failed {
            reason: err.reason(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_reported_with_its_own_code() {
        let err = TranscodeError::EncodingTimeout {
            rendition: "640x360".into(),
            after: Duration::from_secs(5),
        };
        assert_eq!(err.reason(), FailureReason::EncodingTimeout);
        assert!(err.to_string().contains("after 5s"));
    }

    #[test]
    fn failure_codes_match_serde_names() {
        let json = serde_json::to_string(&FailureReason::ManifestAssemblyError).unwrap();
        assert_eq!(json, format!("\"{}\"", FailureReason::ManifestAssemblyError.as_str()));
    }
}
