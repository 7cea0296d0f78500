use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{BatchId, BatchStatus, RiskLevel, ValidationStatus},
    error::SchemaViolation,
    timestamp,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub total_merchants: u64,
    pub processed_merchants: u64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ValidationResult>>,
}

impl BatchJob {
    /// Checks the invariants a snapshot must hold before anything reads it.
    ///
    /// An empty `results` list on a job that is not `COMPLETED` is dropped
    /// rather than rejected, since the service may send `[]` as a placeholder.
    pub fn into_validated(mut self) -> Result<Self, SchemaViolation> {
        if self.batch_id.as_str().trim().is_empty() {
            return Err(SchemaViolation::EmptyBatchId);
        }
        if self.processed_merchants > self.total_merchants {
            return Err(SchemaViolation::ProcessedExceedsTotal {
                processed: self.processed_merchants,
                total: self.total_merchants,
            });
        }
        if !self.status.is_terminal() && self.completed_at.is_some() {
            return Err(SchemaViolation::UnexpectedCompletedAt {
                status: self.status.to_string(),
            });
        }

        let result_count = self.results.as_ref().map(Vec::len);
        match (self.status, result_count) {
            (BatchStatus::Completed, None) => return Err(SchemaViolation::MissingResults),
            (BatchStatus::Completed, Some(actual)) => {
                if actual as u64 != self.total_merchants {
                    return Err(SchemaViolation::ResultCountMismatch {
                        expected: self.total_merchants,
                        actual,
                    });
                }
            }
            (status, Some(count)) if count > 0 => {
                return Err(SchemaViolation::UnexpectedResults {
                    status: status.to_string(),
                    count,
                });
            }
            (_, Some(_)) => self.results = None,
            (_, None) => {}
        }

        for (index, result) in self.results.iter().flatten().enumerate() {
            let score = result.risk_assessment.risk_score;
            if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                return Err(SchemaViolation::RiskScoreOutOfRange {
                    index,
                    score: score.to_string(),
                });
            }
        }

        Ok(self)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn results(&self) -> &[ValidationResult] {
        self.results.as_deref().unwrap_or_default()
    }

    pub fn progress_percent(&self) -> u8 {
        if self.total_merchants == 0 {
            return if self.status == BatchStatus::Completed {
                100
            } else {
                0
            };
        }
        let ratio = self.processed_merchants as f64 / self.total_merchants as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub search_query: String,
    pub validation_status: ValidationStatus,
    pub risk_assessment: RiskAssessment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_info: Option<MerchantInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_comparison: Option<AddressComparison>,
    /// Registry lookup; carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj_comparison: Option<Value>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantInfo {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ratings_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressComparison {
    pub provided_address: String,
    pub google_address: String,
    pub similarity_score: f64,
    pub is_match: bool,
    #[serde(default)]
    pub differences: Vec<String>,
}

/// One merchant row as accepted by the service's JSON batch endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantRecord {
    pub merchant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchValidationRequest {
    pub merchants: Vec<MerchantRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_maps_api: Option<String>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}
