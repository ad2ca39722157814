use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use log::{debug, info};
use reqwest::Client;

use crate::config::UploadConfig;
use crate::models::{CanonicalRecord, ValidationResult};

pub const VALIDATE_UPLOAD_PATH: &str = "/api/physical-flow/upload/validate";

/// Batch validation of canonical records.
///
/// Implementations must answer with exactly one result per record, in input order.
pub trait ValidationGateway: Send + Sync {
    fn validate<'a>(&'a self, records: &'a [CanonicalRecord]) -> BoxFuture<'a, Result<Vec<ValidationResult>>>;
}

/// Fails when the gateway broke the one-result-per-record contract.
pub fn ensure_aligned(records: &[CanonicalRecord], results: &[ValidationResult]) -> Result<()> {
    if records.len() != results.len() {
        bail!(
            "Validation returned {} results for {} submitted records",
            results.len(),
            records.len()
        );
    }
    Ok(())
}

/// Posts batches to the repository's upload validation endpoint.
pub struct HttpValidationGateway {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpValidationGateway {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client for validation gateway")?;
        let endpoint = format!("{}{}", config.base_url.trim_end_matches('/'), VALIDATE_UPLOAD_PATH);
        info!("Validation gateway endpoint: {}", endpoint);
        Ok(HttpValidationGateway {
            client,
            endpoint,
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_batch(&self, records: &[CanonicalRecord]) -> Result<Vec<ValidationResult>> {
        debug!("Posting {} records to {}", records.len(), self.endpoint);
        let mut request = self.client.post(&self.endpoint).json(records);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Validation request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Validation endpoint returned {}: {}", status, body);
        }

        let results: Vec<ValidationResult> = response
            .json()
            .await
            .context("Failed to decode validation response")?;
        ensure_aligned(records, &results)?;
        info!("Validation endpoint answered with {} results.", results.len());
        Ok(results)
    }
}

impl ValidationGateway for HttpValidationGateway {
    fn validate<'a>(&'a self, records: &'a [CanonicalRecord]) -> BoxFuture<'a, Result<Vec<ValidationResult>>> {
        Box::pin(self.post_batch(records))
    }
}
