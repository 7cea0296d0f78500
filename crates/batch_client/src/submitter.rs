use std::sync::Arc;

use shared::protocol::BatchJob;
use tracing::{info, warn};

use crate::{
    error::SessionError,
    ingest::BatchInput,
    service::{CsvUpload, ValidationService},
};

/// Performs the single upload request for a batch. Never retries.
pub struct BatchSubmitter {
    service: Arc<dyn ValidationService>,
}

impl BatchSubmitter {
    pub fn new(service: Arc<dyn ValidationService>) -> Self {
        Self { service }
    }

    pub async fn submit(&self, input: &BatchInput) -> Result<BatchJob, SessionError> {
        let outcome = match input {
            BatchInput::CsvFile(file) => {
                let bytes = tokio::fs::read(&file.path).await.map_err(|err| {
                    SessionError::SubmissionFailed(format!(
                        "failed to read {}: {err}",
                        file.path.display()
                    ))
                })?;
                self.service
                    .upload_csv(CsvUpload {
                        file_name: file.name.clone(),
                        content_type: file.declared_type.clone(),
                        bytes,
                    })
                    .await
            }
            BatchInput::Records(records) => self.service.submit_records(records.clone()).await,
        };

        match outcome {
            Ok(job) => {
                info!(
                    batch_id = %job.batch_id,
                    status = %job.status,
                    total = job.total_merchants,
                    "submitter: batch accepted"
                );
                Ok(job)
            }
            Err(err) => {
                warn!(error = %err, "submitter: batch submission failed");
                Err(SessionError::SubmissionFailed(err.to_string()))
            }
        }
    }
}
