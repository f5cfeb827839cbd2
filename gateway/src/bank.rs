//! # Bank Validation Orchestrator
//!
//! Validates the wrapper token, forwards the decrypted request downstream
//! and writes exactly one audit record per call. The account number is
//! masked before anything is persisted or logged.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use txnwrap::clock::{Clock, SystemClock};
use txnwrap::storage::{AuditRecord, AuditStatus, AuditStore};
use txnwrap::token::TokenService;

use crate::downstream::{BankValidationRequest, BankValidator, DownstreamError};
use crate::metrics::SharedMetrics;

/// Why an orchestrated bank validation did not produce a response body.
#[derive(Debug, thiserror::Error)]
pub enum BankValidationError {
    #[error("Invalid or expired wrapper token")]
    TokenRejected,

    #[error("Bank validation failed with downstream error")]
    Downstream { status: u16, body: String },

    #[error("Failed to validate bank account")]
    Transport(String),
}

/// Runs token check, downstream call and audit for one request.
pub struct BankValidationService {
    tokens: Arc<TokenService>,
    validator: Arc<dyn BankValidator>,
    audits: Arc<dyn AuditStore>,
    metrics: SharedMetrics,
}

impl BankValidationService {
    pub fn new(
        tokens: Arc<TokenService>,
        validator: Arc<dyn BankValidator>,
        audits: Arc<dyn AuditStore>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            tokens,
            validator,
            audits,
            metrics,
        }
    }

    /// Validate `wrapper_token`, then call the bank. Returns the downstream body.
    pub async fn validate_account(
        &self,
        request: &BankValidationRequest,
        wrapper_token: &str,
    ) -> Result<String, BankValidationError> {
        let request_id = request.request_id.clone();
        let masked = masked_payload(request);
        info!(request_id = ?request_id, "bank validation started");
        debug!(request_id = ?request_id, payload = %masked, "bank validation payload (masked)");

        let authenticated = self.tokens.authenticate(wrapper_token, None, None);
        self.metrics.record_validation(authenticated.is_ok());
        if authenticated.is_err() {
            let err = BankValidationError::TokenRejected;
            self.audit(&request_id, &masked, &err.to_string(), AuditStatus::TokenInvalid);
            warn!(request_id = ?request_id, "wrapper token validation failed");
            return Err(err);
        }

        let started = Instant::now();
        let outcome = self.validator.validate(request).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(body) => {
                self.audit(&request_id, &masked, &body, AuditStatus::Success);
                self.metrics
                    .record_downstream(AuditStatus::Success.as_str(), elapsed.as_secs_f64());
                info!(
                    request_id = ?request_id,
                    duration_ms = elapsed.as_millis() as u64,
                    "bank validation completed"
                );
                Ok(body)
            }
            Err(DownstreamError::Status { status, body }) => {
                self.audit(&request_id, &masked, &body, AuditStatus::Failed);
                self.metrics
                    .record_downstream(AuditStatus::Failed.as_str(), elapsed.as_secs_f64());
                error!(request_id = ?request_id, status, "downstream returned error response");
                Err(BankValidationError::Downstream { status, body })
            }
            Err(DownstreamError::Transport(message)) => {
                self.audit(&request_id, &masked, &message, AuditStatus::Error);
                self.metrics
                    .record_downstream(AuditStatus::Error.as_str(), elapsed.as_secs_f64());
                error!(request_id = ?request_id, error = %message, "downstream call failed");
                Err(BankValidationError::Transport(message))
            }
        }
    }

    /// Append an audit record. A failed write is logged, never surfaced.
    fn audit(&self, request_id: &Option<String>, masked: &str, response: &str, status: AuditStatus) {
        let record = AuditRecord::new(
            request_id.clone(),
            masked.to_string(),
            response,
            status,
            SystemClock.now(),
        );
        if let Err(e) = self.audits.append_audit(record) {
            error!(request_id = ?request_id, error = %e, "failed to persist audit record");
        }
    }
}

// ---------------------------------------------------------------------------
// Masking
// ---------------------------------------------------------------------------

/// `****` followed by the last four characters, or just `****` when the
/// number is missing or shorter than four.
pub fn mask_account_number(account: Option<&str>) -> String {
    match account {
        Some(acct) if acct.chars().count() >= 4 => {
            let tail: String = acct.chars().skip(acct.chars().count() - 4).collect();
            format!("****{tail}")
        }
        _ => "****".to_string(),
    }
}

/// Audit view of a request: every field present, missing ones empty.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MaskedRequest<'a> {
    entity_id: &'a str,
    program_id: &'a str,
    request_id: &'a str,
    cust_name: &'a str,
    cust_ifsc: &'a str,
    cust_acct_no: String,
    tracking_ref_no: &'a str,
    txn_type: &'a str,
}

/// JSON of `request` with the account number masked.
pub fn masked_payload(request: &BankValidationRequest) -> String {
    let masked = MaskedRequest {
        entity_id: request.entity_id.as_deref().unwrap_or_default(),
        program_id: request.program_id.as_deref().unwrap_or_default(),
        request_id: request.request_id.as_deref().unwrap_or_default(),
        cust_name: request.cust_name.as_deref().unwrap_or_default(),
        cust_ifsc: request.cust_ifsc.as_deref().unwrap_or_default(),
        cust_acct_no: mask_account_number(request.cust_acct_no.as_deref()),
        tracking_ref_no: request.tracking_ref_no.as_deref().unwrap_or_default(),
        txn_type: request.txn_type.as_deref().unwrap_or_default(),
    };
    serde_json::to_string(&masked).unwrap_or_else(|_| "{}".to_string())
}
