//! # Token Lifecycle
//!
//! Issues and validates transaction tokens.
//!
//! A token is the deterministic encryption of
//!
//! ```text
//! user_id ‖ merchant_id ‖ password ‖ "YYYY-MM-DD HH:MM:SS" ‖ PROCESSOR
//! ```
//!
//! with no separators. Decrypting a token and re-deriving that string from
//! the stored row is the integrity check; there is no MAC.
//!
//! ## Freshness
//!
//! Both issuance reuse and validation expiry measure whole minutes from the
//! row's *business* timestamp (not its creation time) to the service clock.
//! Fewer than [`FRESHNESS_WINDOW_MINUTES`] minutes is fresh.

pub mod issue;
pub mod reference;
pub mod validate;

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::clock::{minutes_between, Clock, SystemClock};
use crate::config::{WrapperConfig, FRESHNESS_WINDOW_MINUTES, TIMESTAMP_FORMAT};
use crate::crypto::CipherKey;
use crate::error::WrapperResult;
use crate::storage::TokenStore;

pub use issue::Issued;
pub use validate::Rejection;

/// Caller-supplied issuance parameters. camelCase on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueRequest {
    pub client_id: String,
    /// Any case; stored uppercase.
    pub processor: String,
    pub transaction_user_id: String,
    pub transaction_merchant_id: String,
    /// `%Y-%m-%d %H:%M:%S`, no zone.
    pub transaction_timestamp: String,
}

/// Issues and validates tokens against a [`TokenStore`].
///
/// Holds no mutable state of its own; share it via `Arc`.
pub struct TokenService {
    key: CipherKey,
    password: String,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Build a service on the transaction key pair of `config`.
    ///
    /// Fails with `Configuration` if the key or IV has the wrong length.
    pub fn new(config: &WrapperConfig, store: Arc<dyn TokenStore>) -> WrapperResult<Self> {
        let key = CipherKey::from_material(&config.transaction)?;
        Ok(Self {
            key,
            password: config.transaction_password.clone(),
            store,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the wall clock, typically with a [`crate::clock::ManualClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The token plaintext for the given fields. `processor` must already be
    /// uppercase.
    pub(crate) fn plaintext(
        &self,
        user_id: &str,
        merchant_id: &str,
        timestamp: NaiveDateTime,
        processor: &str,
    ) -> String {
        format!(
            "{user_id}{merchant_id}{}{}{processor}",
            self.password,
            timestamp.format(TIMESTAMP_FORMAT)
        )
    }

    /// Whether `timestamp` is still inside the freshness window.
    pub(crate) fn is_fresh(&self, timestamp: NaiveDateTime) -> bool {
        minutes_between(timestamp, self.clock.now()) < FRESHNESS_WINDOW_MINUTES
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
