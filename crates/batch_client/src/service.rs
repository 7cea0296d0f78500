//! Wire contract of the remote validation service.

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::BatchId,
    error::ServiceErrorBody,
    protocol::{BatchJob, BatchValidationRequest, HealthStatus, MerchantRecord},
};
use tracing::debug;
use url::Url;

use crate::error::ServiceError;

/// File contents handed to the upload endpoint.
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ValidationService: Send + Sync {
    async fn upload_csv(&self, upload: CsvUpload) -> Result<BatchJob, ServiceError>;
    async fn submit_records(&self, merchants: Vec<MerchantRecord>)
        -> Result<BatchJob, ServiceError>;
    async fn batch_status(&self, batch_id: &BatchId) -> Result<BatchJob, ServiceError>;
    async fn health(&self) -> Result<HealthStatus, ServiceError>;
}

pub struct HttpValidationService {
    http: Client,
    base_url: Url,
}

impl HttpValidationService {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ServiceError> {
        let base_url = parse_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "url cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, ServiceError> {
    let url = Url::parse(raw.trim()).map_err(|err| ServiceError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ServiceError::InvalidUrl {
            url: raw.to_string(),
            reason: "service url must start with http:// or https://".to_string(),
        });
    }
    if url.cannot_be_a_base() {
        return Err(ServiceError::InvalidUrl {
            url: raw.to_string(),
            reason: "url cannot carry a path".to_string(),
        });
    }
    Ok(url)
}

#[async_trait]
impl ValidationService for HttpValidationService {
    async fn upload_csv(&self, upload: CsvUpload) -> Result<BatchJob, ServiceError> {
        let url = self.endpoint(&["upload-csv"])?;
        debug!(%url, file = %upload.file_name, bytes = upload.bytes.len(), "service: uploading csv");
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)?;
        let form = multipart::Form::new().part("file", part);
        let res = self.http.post(url).multipart(form).send().await?;
        decode_job(res).await
    }

    async fn submit_records(
        &self,
        merchants: Vec<MerchantRecord>,
    ) -> Result<BatchJob, ServiceError> {
        let url = self.endpoint(&["validate-batch"])?;
        debug!(%url, records = merchants.len(), "service: submitting records");
        let res = self
            .http
            .post(url)
            .json(&BatchValidationRequest { merchants })
            .send()
            .await?;
        decode_job(res).await
    }

    async fn batch_status(&self, batch_id: &BatchId) -> Result<BatchJob, ServiceError> {
        let url = self.endpoint(&["batch-status", batch_id.as_str()])?;
        let res = self.http.get(url).send().await?;
        decode_job(res).await
    }

    async fn health(&self) -> Result<HealthStatus, ServiceError> {
        let url = self.endpoint(&["health"])?;
        let res = self.http.get(url).send().await?;
        decode_json(res).await
    }
}

async fn decode_job(res: Response) -> Result<BatchJob, ServiceError> {
    let job: BatchJob = decode_json(res).await?;
    Ok(job.into_validated()?)
}

async fn decode_json<T: DeserializeOwned>(res: Response) -> Result<T, ServiceError> {
    let res = ensure_success(res).await?;
    let bytes = res.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn ensure_success(res: Response) -> Result<Response, ServiceError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ServiceErrorBody>(&body) {
        Ok(parsed) => parsed.message(),
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body,
    };
    Err(ServiceError::Rejected {
        status: status.as_u16(),
        message,
    })
}
