use shared::{
    domain::{BatchStatus, ValidationStatus},
    protocol::BatchJob,
};

/// Counts of per-record outcomes for a completed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub valid: usize,
    pub suspicious: usize,
    pub invalid: usize,
    pub error: usize,
}

impl ResultSummary {
    pub fn total(&self) -> usize {
        self.valid + self.suspicious + self.invalid + self.error
    }

    pub fn count(&self, status: ValidationStatus) -> usize {
        match status {
            ValidationStatus::Valid => self.valid,
            ValidationStatus::Suspicious => self.suspicious,
            ValidationStatus::Invalid => self.invalid,
            ValidationStatus::Error => self.error,
        }
    }
}

/// Buckets the results of `job` by validation status.
///
/// Returns `None` unless the job is `COMPLETED`. This walks every result on
/// each call; callers rendering repeatedly should keep the value.
pub fn summarize(job: &BatchJob) -> Option<ResultSummary> {
    if job.status != BatchStatus::Completed {
        return None;
    }

    let mut summary = ResultSummary::default();
    for result in job.results() {
        match result.validation_status {
            ValidationStatus::Valid => summary.valid += 1,
            ValidationStatus::Suspicious => summary.suspicious += 1,
            ValidationStatus::Invalid => summary.invalid += 1,
            ValidationStatus::Error => summary.error += 1,
        }
    }
    Some(summary)
}
