//! # Downstream Bank Validator
//!
//! The external service that actually checks a bank account. The gateway
//! talks to it through [`BankValidator`] so handlers can be tested against a
//! stub; [`TrustHubClient`] is the real HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Request and connect timeout for downstream calls.
pub const DOWNSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Decrypted business payload of a bank validation call. camelCase on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankValidationRequest {
    pub entity_id: Option<String>,
    pub program_id: Option<String>,
    pub request_id: Option<String>,
    pub cust_name: Option<String>,
    pub cust_ifsc: Option<String>,
    pub cust_acct_no: Option<String>,
    pub tracking_ref_no: Option<String>,
    pub txn_type: Option<String>,
}

/// Failures of a downstream call.
#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    /// The service answered with a non-2xx status.
    #[error("downstream returned status {status}")]
    Status { status: u16, body: String },

    /// The service could not be reached or the response could not be read.
    #[error("downstream call failed: {0}")]
    Transport(String),
}

/// Anything that can validate a bank account. Returns the raw response body.
#[async_trait]
pub trait BankValidator: Send + Sync {
    async fn validate(&self, request: &BankValidationRequest) -> Result<String, DownstreamError>;
}

/// reqwest client for the TrustHub bank validation API.
pub struct TrustHubClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl TrustHubClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, DownstreamError> {
        let http = Client::builder()
            .timeout(DOWNSTREAM_TIMEOUT)
            .connect_timeout(DOWNSTREAM_TIMEOUT)
            .build()
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for TrustHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustHubClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BankValidator for TrustHubClient {
    async fn validate(&self, request: &BankValidationRequest) -> Result<String, DownstreamError> {
        let response = self
            .http
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), bytes = body.len(), "downstream responded");

        if status.is_success() {
            Ok(body)
        } else {
            Err(DownstreamError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
