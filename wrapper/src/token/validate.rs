//! Token validation.
//!
//! [`TokenService::check`] returns why a token was refused; callers outside
//! the core only ever see the boolean from [`TokenService::validate`] or the
//! reasonless [`WrapperError::Unauthenticated`] from
//! [`TokenService::authenticate`]. The reason goes to the log.

use thiserror::Error;
use tracing::{info, warn};

use super::TokenService;
use crate::crypto;
use crate::storage::TokenRow;
use crate::{WrapperError, WrapperResult};

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("token is blank")]
    BlankToken,
    #[error("invalid or unknown transaction token")]
    UnknownToken,
    #[error("token does not belong to this client")]
    ClientMismatch,
    #[error("token processor mismatch")]
    ProcessorMismatch,
    #[error("missing merchant transaction timestamp")]
    MissingTimestamp,
    #[error("transaction token expired")]
    Expired,
    #[error("invalid transaction token (payload mismatch)")]
    PayloadMismatch,
    #[error("token store unavailable")]
    StoreUnavailable,
}

/// `Some(v)` only if the caller actually supplied a non-blank value.
fn supplied(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl TokenService {
    /// Validate `token`, optionally pinning the owning client and processor.
    ///
    /// Never fails and never writes to the store.
    pub fn validate(&self, token: &str, client_id: Option<&str>, processor: Option<&str>) -> bool {
        self.authenticate(token, client_id, processor).is_ok()
    }

    /// Like [`validate`](Self::validate) but hands back the owning row. Every
    /// refusal collapses to [`WrapperError::Unauthenticated`]; the reason is
    /// only logged.
    pub fn authenticate(
        &self,
        token: &str,
        client_id: Option<&str>,
        processor: Option<&str>,
    ) -> WrapperResult<TokenRow> {
        match self.check(token, client_id, processor) {
            Ok(row) => {
                info!(
                    client_id = %row.client_id,
                    merchant_id = %row.transaction_merchant_id,
                    "transaction token validated"
                );
                Ok(row)
            }
            Err(reason) => {
                warn!(%reason, "token validation failed");
                Err(WrapperError::Unauthenticated)
            }
        }
    }

    /// Run every validation step and return the matching row or the first
    /// reason for refusal.
    pub fn check(
        &self,
        token: &str,
        client_id: Option<&str>,
        processor: Option<&str>,
    ) -> Result<TokenRow, Rejection> {
        if token.trim().is_empty() {
            return Err(Rejection::BlankToken);
        }

        let row = self
            .store
            .find_by_token_value(token)
            .map_err(|e| {
                warn!(error = %e, "token lookup failed");
                Rejection::StoreUnavailable
            })?
            .ok_or(Rejection::UnknownToken)?;

        if let Some(client_id) = supplied(client_id) {
            if row.client_id != client_id {
                return Err(Rejection::ClientMismatch);
            }
        }
        if let Some(processor) = supplied(processor) {
            if row.processor.to_uppercase() != processor.to_uppercase() {
                return Err(Rejection::ProcessorMismatch);
            }
        }

        let timestamp = row.transaction_timestamp.ok_or(Rejection::MissingTimestamp)?;
        if !self.is_fresh(timestamp) {
            return Err(Rejection::Expired);
        }

        let expected = self.plaintext(
            &row.transaction_user_id,
            &row.transaction_merchant_id,
            timestamp,
            &row.processor,
        );
        match crypto::decrypt(token, &self.key) {
            Ok(decrypted) if decrypted == expected => Ok(row),
            _ => Err(Rejection::PayloadMismatch),
        }
    }
}
