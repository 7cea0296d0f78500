use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{BatchId, BatchStatus, RiskLevel, ValidationStatus},
    protocol::{
        BatchJob, HealthStatus, MerchantInfo, MerchantRecord, RiskAssessment, ValidationResult,
    },
};

use crate::{
    error::ServiceError,
    service::{CsvUpload, ValidationService},
};

pub(crate) enum Step {
    Job(BatchJob),
    Fail(String),
}

/// In-process stand-in for the validation service that replays a script of
/// status responses and records what it was asked.
pub(crate) struct ScriptedService {
    submit_outcome: Mutex<Option<Step>>,
    statuses: Mutex<VecDeque<Step>>,
    last_job: Mutex<Option<BatchJob>>,
    fetch_delay: Duration,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) fetches: AtomicUsize,
    pub(crate) uploads: Mutex<Vec<CsvUpload>>,
    pub(crate) submitted_records: Mutex<Vec<MerchantRecord>>,
}

impl ScriptedService {
    pub(crate) fn new(submit_outcome: Step, statuses: Vec<Step>) -> Self {
        Self {
            submit_outcome: Mutex::new(Some(submit_outcome)),
            statuses: Mutex::new(statuses.into()),
            last_job: Mutex::new(None),
            fetch_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            submitted_records: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn take_submit_outcome(&self) -> Result<BatchJob, ServiceError> {
        let step = self
            .submit_outcome
            .lock()
            .expect("submit lock")
            .take()
            .unwrap_or_else(|| Step::Fail("unexpected second submission".to_string()));
        into_result(step)
    }
}

fn into_result(step: Step) -> Result<BatchJob, ServiceError> {
    match step {
        Step::Job(job) => Ok(job),
        Step::Fail(message) => Err(ServiceError::Rejected {
            status: 503,
            message,
        }),
    }
}

#[async_trait]
impl ValidationService for ScriptedService {
    async fn upload_csv(&self, upload: CsvUpload) -> Result<BatchJob, ServiceError> {
        self.uploads.lock().expect("uploads lock").push(upload);
        self.take_submit_outcome()
    }

    async fn submit_records(
        &self,
        merchants: Vec<MerchantRecord>,
    ) -> Result<BatchJob, ServiceError> {
        self.submitted_records
            .lock()
            .expect("records lock")
            .extend(merchants);
        self.take_submit_outcome()
    }

    async fn batch_status(&self, _batch_id: &BatchId) -> Result<BatchJob, ServiceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let step = self.statuses.lock().expect("statuses lock").pop_front();
        let outcome = match step {
            Some(step) => into_result(step),
            None => self
                .last_job
                .lock()
                .expect("last job lock")
                .clone()
                .ok_or_else(|| ServiceError::Decode("script exhausted".to_string())),
        };
        if let Ok(job) = &outcome {
            *self.last_job.lock().expect("last job lock") = Some(job.clone());
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn health(&self) -> Result<HealthStatus, ServiceError> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            google_maps_api: Some("connected".to_string()),
            timestamp: None,
        })
    }
}

pub(crate) fn job(id: &str, status: BatchStatus, processed: u64, total: u64) -> BatchJob {
    BatchJob {
        batch_id: BatchId::new(id),
        status,
        total_merchants: total,
        processed_merchants: processed,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        completed_at: status
            .is_terminal()
            .then(|| Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap()),
        results: None,
    }
}

pub(crate) fn completed_job(id: &str, results: Vec<ValidationResult>) -> BatchJob {
    let total = results.len() as u64;
    let mut job = job(id, BatchStatus::Completed, total, total);
    job.results = Some(results);
    job
}

pub(crate) fn result(name: &str, status: ValidationStatus, score: f64) -> ValidationResult {
    let merchant_info = (status != ValidationStatus::Error).then(|| MerchantInfo {
        name: name.to_string(),
        address: format!("{name} Plaza, Springfield, IL"),
        place_id: Some(format!("place-{name}")),
        phone: Some("+1 555-0100".to_string()),
        website: Some("https://example.com".to_string()),
        rating: Some(4.5),
        user_ratings_total: Some(120),
        business_status: Some("OPERATIONAL".to_string()),
    });
    let risk_level = match status {
        ValidationStatus::Valid => RiskLevel::Low,
        ValidationStatus::Suspicious => RiskLevel::High,
        ValidationStatus::Invalid | ValidationStatus::Error => RiskLevel::Critical,
    };

    ValidationResult {
        search_query: format!("name: {name}"),
        validation_status: status,
        risk_assessment: RiskAssessment {
            risk_level,
            risk_score: score,
            risk_factors: Vec::new(),
            recommendations: Vec::new(),
        },
        merchant_info,
        address_comparison: None,
        cnpj_comparison: None,
        timestamp: None,
    }
}
