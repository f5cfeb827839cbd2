//! # TokenDB — Persistent Token Store
//!
//! The on-disk token store, built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                          | Value               |
//! |----------------|------------------------------|---------------------|
//! | `tokens`       | row id (UTF-8)               | `bincode(TokenRow)` |
//! | `token_values` | token value (UTF-8)          | row id              |
//! | `order_refs`   | order reference (UTF-8)      | row id              |
//! | `issuance`     | `issuance_key(..)`           | latest row id       |
//! | `audits`       | audit id (8B BE)             | `bincode(AuditRecord)` |
//!
//! ## Write Atomicity
//!
//! `insert` runs as one sled transaction over `tokens`, `order_refs`,
//! `issuance` and `token_values`. Either the row body and all three index
//! entries land together or nothing does, so a token returned by the
//! issuance index is always resolvable by value.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use sled::transaction::{abort, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::debug;

use super::{
    issuance_key, AuditRecord, AuditStore, StoreError, StoreResult, TokenRow, TokenStore,
};
use crate::clock::{Clock, SystemClock};

// ---------------------------------------------------------------------------
// TokenDB
// ---------------------------------------------------------------------------

/// sled-backed [`TokenStore`] and [`AuditStore`].
///
/// sled trees support lock-free concurrent reads, so a `TokenDB` can be
/// shared across threads via `Arc<TokenDB>` without external locking. Cloning
/// is cheap and yields a handle to the same database.
#[derive(Clone)]
pub struct TokenDB {
    db: Db,
    /// Rows by id.
    tokens: Tree,
    /// token value -> id of the most recently written row with that value.
    token_values: Tree,
    /// order reference -> id. Enforces uniqueness.
    order_refs: Tree,
    /// issuance key -> id of the latest row for that key.
    issuance: Tree,
    /// Audit records by monotonically generated id (big-endian u64).
    audits: Tree,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDB")
            .field("tokens", &self.tokens.len())
            .field("audits", &self.audits.len())
            .finish()
    }
}

impl TokenDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let tokens = db.open_tree("tokens")?;
        let token_values = db.open_tree("token_values")?;
        let order_refs = db.open_tree("order_refs")?;
        let issuance = db.open_tree("issuance")?;
        let audits = db.open_tree("audits")?;

        Ok(Self {
            db,
            tokens,
            token_values,
            order_refs,
            issuance,
            audits,
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `clock` for `completed_at` touches.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    // -- Row helpers --------------------------------------------------------

    fn get_row(&self, id: &[u8]) -> StoreResult<Option<TokenRow>> {
        match self.tokens.get(id)? {
            Some(bytes) => {
                let row: TokenRow = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn put_row(&self, row: &TokenRow) -> StoreResult<()> {
        let bytes =
            bincode::serialize(row).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.tokens.insert(row.id.as_bytes(), bytes)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

impl TokenStore for TokenDB {
    fn find_by_token_value(&self, token: &str) -> StoreResult<Option<TokenRow>> {
        match self.token_values.get(token.as_bytes())? {
            Some(id) => self.get_row(&id),
            None => Ok(None),
        }
    }

    fn find_latest_by_client_processor_timestamp(
        &self,
        client_id: &str,
        timestamp: NaiveDateTime,
        processor: &str,
    ) -> StoreResult<Option<TokenRow>> {
        let key = issuance_key(client_id, timestamp, processor);
        match self.issuance.get(key)? {
            Some(id) => self.get_row(&id),
            None => Ok(None),
        }
    }

    fn insert(&self, mut row: TokenRow, expected_latest: Option<&str>) -> StoreResult<TokenRow> {
        row.completed_at = self.clock.now();
        let body =
            bincode::serialize(&row).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let index_key = row
            .transaction_timestamp
            .map(|ts| issuance_key(&row.client_id, ts, &row.processor));

        let outcome = (&self.tokens, &self.order_refs, &self.issuance, &self.token_values)
            .transaction(|(tokens, order_refs, issuance, token_values)| {
                let id = row.id.as_bytes();
                if tokens.get(id)?.is_some() {
                    return abort(StoreError::Conflict(format!("duplicate row id {}", row.id)));
                }
                if order_refs.get(row.order_reference.as_bytes())?.is_some() {
                    return abort(StoreError::Conflict(format!(
                        "order reference {} already exists",
                        row.order_reference
                    )));
                }
                if let Some(key) = &index_key {
                    let current = issuance.get(key.as_slice())?;
                    if current.as_deref() != expected_latest.map(str::as_bytes) {
                        return abort(StoreError::Conflict(
                            "a newer token exists for this issuance key".into(),
                        ));
                    }
                    issuance.insert(key.as_slice(), id)?;
                }
                tokens.insert(id, body.as_slice())?;
                order_refs.insert(row.order_reference.as_bytes(), id)?;
                token_values.insert(row.token_value.as_bytes(), id)?;
                Ok(())
            });

        match outcome {
            Ok(()) => Ok(row),
            Err(TransactionError::Abort(e)) => {
                debug!(client_id = %row.client_id, processor = %row.processor, error = %e, "insert refused");
                Err(e)
            }
            Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e)),
        }
    }

    fn update(&self, mut row: TokenRow) -> StoreResult<TokenRow> {
        let previous = self
            .get_row(row.id.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(row.id.clone()))?;

        row.completed_at = self.clock.now();
        self.put_row(&row)?;

        if previous.token_value != row.token_value {
            // Only drop the old mapping if it still points at this row.
            let _ = self.token_values.compare_and_swap(
                previous.token_value.as_bytes(),
                Some(row.id.as_bytes()),
                None::<&[u8]>,
            )?;
            self.token_values
                .insert(row.token_value.as_bytes(), row.id.as_bytes())?;
        }
        Ok(row)
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.tokens.len())
    }
}

// ---------------------------------------------------------------------------
// AuditStore
// ---------------------------------------------------------------------------

impl AuditStore for TokenDB {
    fn append_audit(&self, mut record: AuditRecord) -> StoreResult<u64> {
        let id = self.db.generate_id()?;
        record.id = id;
        let bytes =
            bincode::serialize(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.audits.insert(id.to_be_bytes(), bytes)?;
        Ok(id)
    }

    fn get_audit(&self, id: u64) -> StoreResult<Option<AuditRecord>> {
        match self.audits.get(id.to_be_bytes())? {
            Some(bytes) => {
                let record: AuditRecord = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn audits_for_request(&self, request_id: &str) -> StoreResult<Vec<AuditRecord>> {
        let mut out = Vec::new();
        for entry in self.audits.iter() {
            let (_key, value) = entry?;
            let record: AuditRecord = bincode::deserialize(&value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if record.request_id.as_deref() == Some(request_id) {
                out.push(record);
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
