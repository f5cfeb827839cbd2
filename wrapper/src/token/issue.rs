//! Token issuance.

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::reference::order_reference;
use super::{IssueRequest, TokenService};
use crate::config::TIMESTAMP_FORMAT;
use crate::crypto;
use crate::error::{WrapperError, WrapperResult};
use crate::storage::{StoreError, TokenRow};

/// Outcome of an issuance call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub token: String,
    pub order_reference: String,
    /// `true` when an existing fresh token was returned.
    pub reused: bool,
}

impl Issued {
    fn from_row(row: TokenRow, reused: bool) -> Self {
        Self {
            token: row.token_value,
            order_reference: row.order_reference,
            reused,
        }
    }
}

impl TokenService {
    /// Issue a token, or return the existing one while it is still fresh.
    pub fn issue(&self, request: &IssueRequest) -> WrapperResult<String> {
        self.issue_detailed(request).map(|issued| issued.token)
    }

    /// Like [`issue`](Self::issue), also reporting the order reference and
    /// whether the token was reused.
    pub fn issue_detailed(&self, request: &IssueRequest) -> WrapperResult<Issued> {
        let (processor, timestamp) = parse_request(request)?;
        let client_id = request.client_id.as_str();

        let latest = self.store.find_latest_by_client_processor_timestamp(
            client_id,
            timestamp,
            &processor,
        )?;

        if let Some(existing) = &latest {
            if self.is_fresh(timestamp) {
                warn!(client_id, processor = %processor, "token already exists, returning existing token");
                return Ok(Issued::from_row(existing.clone(), true));
            }
            info!(client_id, processor = %processor, "existing token expired, issuing a new one");
        }

        let plaintext = self.plaintext(
            &request.transaction_user_id,
            &request.transaction_merchant_id,
            timestamp,
            &processor,
        );
        let now = self.clock.now();
        let row = TokenRow {
            id: Uuid::new_v4().to_string(),
            order_reference: order_reference(now),
            token_value: crypto::encrypt(&plaintext, &self.key),
            transaction_timestamp: Some(timestamp),
            transaction_user_id: request.transaction_user_id.clone(),
            transaction_merchant_id: request.transaction_merchant_id.clone(),
            client_id: client_id.to_string(),
            processor: processor.clone(),
            initiated_at: now,
            completed_at: now,
        };

        let expected = latest.as_ref().map(|r| r.id.as_str());
        match self.store.insert(row, expected) {
            Ok(row) => {
                info!(
                    client_id,
                    processor = %processor,
                    order_reference = %row.order_reference,
                    "token generated"
                );
                Ok(Issued::from_row(row, false))
            }
            Err(StoreError::Conflict(what)) => {
                // Someone else wrote a row for this key first; serve theirs.
                let winner = self.store.find_latest_by_client_processor_timestamp(
                    client_id,
                    timestamp,
                    &processor,
                )?;
                match winner {
                    Some(w) if Some(w.id.as_str()) != expected => {
                        debug!(client_id, processor = %processor, "lost issuance race, reusing winner");
                        Ok(Issued::from_row(w, true))
                    }
                    _ => Err(WrapperError::Conflict(what)),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Check preconditions and return the normalized processor and timestamp.
fn parse_request(request: &IssueRequest) -> WrapperResult<(String, NaiveDateTime)> {
    if request.client_id.trim().is_empty() {
        return Err(WrapperError::InvalidInput("clientId is required".into()));
    }
    if request.processor.trim().is_empty() {
        return Err(WrapperError::InvalidInput("processor is required".into()));
    }
    let timestamp =
        NaiveDateTime::parse_from_str(&request.transaction_timestamp, TIMESTAMP_FORMAT).map_err(
            |_| {
                WrapperError::InvalidInput(format!(
                    "transactionTimestamp must match {TIMESTAMP_FORMAT}"
                ))
            },
        )?;
    Ok((request.processor.to_uppercase(), timestamp))
}
