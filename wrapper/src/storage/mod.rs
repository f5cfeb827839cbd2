//! # Storage Module
//!
//! The token store is the only shared mutable state in txnwrap. Everything
//! else (token service, envelope) is a pure function of its inputs plus
//! whatever the store returns.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs     — TokenStore / AuditStore traits, TokenRow, StoreError
//! db.rs      — sled-backed TokenDB (named trees, transactional inserts)
//! memory.rs  — in-process MemoryTokenStore behind a single RwLock
//! audit.rs   — bank validation audit records
//! ```
//!
//! ## Lookups
//!
//! Two lookups must agree on what they return:
//!
//! 1. by exact token value (validation), and
//! 2. by the issuance key `(client_id, transaction_timestamp, processor)`
//!    (idempotent issuance), which always resolves to the most recently
//!    inserted row for that key.
//!
//! ## Issuance race
//!
//! `insert` takes the row id the caller saw for the issuance key (or `None`)
//! and atomically swaps the index to the new row only if it still matches.
//! Two concurrent issuers for the same key therefore can't both win: the
//! loser gets [`StoreError::Conflict`] and re-reads the winner's row.

pub mod audit;
pub mod db;
pub mod memory;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::TIMESTAMP_FORMAT;

pub use audit::{AuditRecord, AuditStatus};
pub use db::TokenDB;
pub use memory::MemoryTokenStore;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A uniqueness constraint or the issuance index CAS failed.
    #[error("{0}")]
    Conflict(String),

    #[error("row not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One issued transaction token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRow {
    /// UUID v4, assigned at issuance.
    pub id: String,
    /// `TXN` + issuance date + random suffix. Unique.
    pub order_reference: String,
    /// The bearer token (base64 ciphertext).
    pub token_value: String,
    /// Business timestamp of the merchant transaction. Expiry is anchored here.
    pub transaction_timestamp: Option<NaiveDateTime>,
    pub transaction_user_id: String,
    pub transaction_merchant_id: String,
    pub client_id: String,
    /// Always uppercase.
    pub processor: String,
    pub initiated_at: NaiveDateTime,
    /// Touched on every write to the row.
    pub completed_at: NaiveDateTime,
}

/// Composite key of the issuance index.
///
/// Fields are joined with the ASCII unit separator, which can't appear in a
/// formatted timestamp and is vanishingly unlikely in client or processor ids.
pub fn issuance_key(client_id: &str, timestamp: NaiveDateTime, processor: &str) -> Vec<u8> {
    format!(
        "{client_id}\u{1f}{}\u{1f}{processor}",
        timestamp.format(TIMESTAMP_FORMAT)
    )
    .into_bytes()
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persistence capability required by the token service.
pub trait TokenStore: Send + Sync {
    /// Find the row whose token value is exactly `token`.
    ///
    /// If several rows share a token value, the most recently written wins.
    fn find_by_token_value(&self, token: &str) -> StoreResult<Option<TokenRow>>;

    /// Latest row for the issuance key, if any.
    fn find_latest_by_client_processor_timestamp(
        &self,
        client_id: &str,
        timestamp: NaiveDateTime,
        processor: &str,
    ) -> StoreResult<Option<TokenRow>>;

    /// Persist a new row.
    ///
    /// `expected_latest` is the id of the row the caller saw for this row's
    /// issuance key (`None` if it saw nothing). Fails with `Conflict` when
    /// the order reference is taken or the issuance index moved.
    fn insert(&self, row: TokenRow, expected_latest: Option<&str>) -> StoreResult<TokenRow>;

    /// Rewrite an existing row in place, touching `completed_at`.
    fn update(&self, row: TokenRow) -> StoreResult<TokenRow>;

    /// Number of stored rows.
    fn count(&self) -> StoreResult<usize>;
}

/// Append-only log of bank validation calls.
pub trait AuditStore: Send + Sync {
    /// Append a record and return its assigned id.
    fn append_audit(&self, record: AuditRecord) -> StoreResult<u64>;

    fn get_audit(&self, id: u64) -> StoreResult<Option<AuditRecord>>;

    /// All records for a request id, oldest first.
    fn audits_for_request(&self, request_id: &str) -> StoreResult<Vec<AuditRecord>>;
}
