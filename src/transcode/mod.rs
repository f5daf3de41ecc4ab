//! Media transcoding pipeline: turns one uploaded source video into an HLS
//! rendition ladder plus master manifest, off the request path.

pub mod dispatch;
pub mod encoder;
pub mod error;
pub mod guard;
pub mod ladder;
pub mod manifest;
pub mod publish;
pub mod source;
pub mod worker;

pub use dispatch::{JobQueue, LocalJobQueue, SubmitError, SubmitOutcome, TranscodeDispatcher};
pub use error::{FailureReason, JobOutcome, TranscodeError};
pub use worker::TranscodeWorker;
