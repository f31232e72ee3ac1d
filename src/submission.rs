use crate::error::AppError;
use crate::metadata::{NormalizedRecord, SubmissionPayload};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, record: &NormalizedRecord) -> Result<(), AppError>;
}

/// Posts a record once to the classification endpoint. No retries.
pub struct HttpSubmitter {
    client: Client,
    url: Url,
}

impl HttpSubmitter {
    pub fn new(url: &str) -> Result<Self, AppError> {
        let url = Url::parse(url)
            .map_err(|e| AppError::Generic(format!("invalid submission URL: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            url,
        })
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, record: &NormalizedRecord) -> Result<(), AppError> {
        let payload: SubmissionPayload = record.to_payload();
        log::info!(
            "Submitting capture for {} at ({}, {}) taken {}",
            payload.user_id,
            payload.latitude,
            payload.longitude,
            payload.date_taken
        );
        log::debug!("Payload base64 length: {}", payload.base64.len());

        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::error!("Submission rejected with status {}", status);
            return Err(AppError::SubmissionRejected(status));
        }

        log::info!("Submission accepted with status {}", status);
        Ok(())
    }
}
