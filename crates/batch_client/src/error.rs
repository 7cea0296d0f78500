use std::path::PathBuf;

use shared::{domain::BatchId, error::SchemaViolation};
use thiserror::Error;

/// Failure of a single call to the remote validation service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed service payload: {0}")]
    Decode(String),
    #[error("invalid service url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<SchemaViolation> for ServiceError {
    fn from(value: SchemaViolation) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Session-level outcome taxonomy. Values are cloned into the session state
/// so a caller can render them after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("file rejected: {reason}")]
    IngestRejected { reason: String },
    #[error("batch submission failed: {0}")]
    SubmissionFailed(String),
    #[error("status polling stopped: {0}")]
    PollTransport(String),
    #[error("batch {batch_id} failed on the validation service")]
    BatchFailed { batch_id: BatchId },
    #[error("no file selected")]
    NoFileSelected,
    #[error("a batch job is already active; reset the session first")]
    JobActive,
    #[error("this selection was already submitted; reset or select a new file")]
    AlreadySubmitted,
    #[error("results are only available for a completed batch")]
    ExportUnavailable,
    #[error("failed to render export: {0}")]
    Export(String),
    #[error("failed to write {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}
