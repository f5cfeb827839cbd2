//! Bank validation audit records.
//!
//! One record per orchestrated call to the downstream bank validator. The
//! request payload is stored with the account number already masked; the
//! response is cut to [`AUDIT_PAYLOAD_MAX_CHARS`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::AUDIT_PAYLOAD_MAX_CHARS;
use crate::crypto::sha256_hex;

/// Outcome recorded for a bank validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    /// Downstream answered 2xx.
    Success,
    /// Downstream answered with an error status.
    Failed,
    /// Downstream could not be reached.
    Error,
    /// The wrapper token was rejected before any downstream call.
    TokenInvalid,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Failed => "FAILED",
            AuditStatus::Error => "ERROR",
            AuditStatus::TokenInvalid => "TOKEN_INVALID",
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted audit row. `id` is assigned by the store on append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: u64,
    pub request_id: Option<String>,
    /// Masked request JSON.
    pub request_payload: String,
    /// SHA-256 hex of `request_payload`.
    pub payload_digest: String,
    pub response_payload: String,
    pub status: AuditStatus,
    pub created_at: NaiveDateTime,
}

impl AuditRecord {
    /// Build a record for a masked request payload. `id` is filled in by the store.
    pub fn new(
        request_id: Option<String>,
        masked_request: String,
        response: &str,
        status: AuditStatus,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            request_id,
            payload_digest: sha256_hex(&masked_request, ""),
            request_payload: masked_request,
            response_payload: truncate_payload(response),
            status,
            created_at,
        }
    }
}

/// Cut `value` to at most [`AUDIT_PAYLOAD_MAX_CHARS`] characters.
pub fn truncate_payload(value: &str) -> String {
    match value.char_indices().nth(AUDIT_PAYLOAD_MAX_CHARS) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
