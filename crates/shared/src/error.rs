use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error body returned by the validation service on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    pub detail: Value,
}

impl ServiceErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Value::String(detail.into()),
        }
    }

    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// A payload that parsed as JSON but breaks a `BatchJob` invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("batch_id is empty")]
    EmptyBatchId,
    #[error("processed_merchants {processed} exceeds total_merchants {total}")]
    ProcessedExceedsTotal { processed: u64, total: u64 },
    #[error("completed batch carries {actual} results for {expected} merchants")]
    ResultCountMismatch { expected: u64, actual: usize },
    #[error("completed batch is missing its results")]
    MissingResults,
    #[error("{status} batch carries {count} results")]
    UnexpectedResults { status: String, count: usize },
    #[error("{status} batch carries completed_at")]
    UnexpectedCompletedAt { status: String },
    #[error("risk_score {score} of result {index} is outside 0..=100")]
    RiskScoreOutOfRange { index: usize, score: String },
}
