//! In-process token store.
//!
//! All maps sit behind one `RwLock` so an insert checks and claims every
//! index under a single write guard. Used by tests, benches and the
//! gateway's `--ephemeral` mode.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::RwLock;

use super::{
    issuance_key, AuditRecord, AuditStore, StoreError, StoreResult, TokenRow, TokenStore,
};
use crate::clock::{Clock, SystemClock};

#[derive(Default)]
struct Inner {
    rows: HashMap<String, TokenRow>,
    token_values: HashMap<String, String>,
    order_refs: HashMap<String, String>,
    issuance: HashMap<Vec<u8>, String>,
    audits: Vec<AuditRecord>,
}

/// [`TokenStore`] and [`AuditStore`] held entirely in memory.
pub struct MemoryTokenStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for `completed_at` touches.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryTokenStore")
            .field("tokens", &inner.rows.len())
            .field("audits", &inner.audits.len())
            .finish()
    }
}

impl TokenStore for MemoryTokenStore {
    fn find_by_token_value(&self, token: &str) -> StoreResult<Option<TokenRow>> {
        let inner = self.inner.read();
        Ok(inner
            .token_values
            .get(token)
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    fn find_latest_by_client_processor_timestamp(
        &self,
        client_id: &str,
        timestamp: NaiveDateTime,
        processor: &str,
    ) -> StoreResult<Option<TokenRow>> {
        let inner = self.inner.read();
        let key = issuance_key(client_id, timestamp, processor);
        Ok(inner
            .issuance
            .get(&key)
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    fn insert(&self, mut row: TokenRow, expected_latest: Option<&str>) -> StoreResult<TokenRow> {
        let mut inner = self.inner.write();

        if inner.rows.contains_key(&row.id) {
            return Err(StoreError::Conflict(format!("duplicate row id {}", row.id)));
        }
        if inner.order_refs.contains_key(&row.order_reference) {
            return Err(StoreError::Conflict(format!(
                "order reference {} already exists",
                row.order_reference
            )));
        }
        let key = row
            .transaction_timestamp
            .map(|ts| issuance_key(&row.client_id, ts, &row.processor));
        if let Some(key) = &key {
            if inner.issuance.get(key).map(String::as_str) != expected_latest {
                return Err(StoreError::Conflict(
                    "a newer token exists for this issuance key".into(),
                ));
            }
        }

        row.completed_at = self.clock.now();
        inner
            .order_refs
            .insert(row.order_reference.clone(), row.id.clone());
        if let Some(key) = key {
            inner.issuance.insert(key, row.id.clone());
        }
        inner
            .token_values
            .insert(row.token_value.clone(), row.id.clone());
        inner.rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    fn update(&self, mut row: TokenRow) -> StoreResult<TokenRow> {
        let mut inner = self.inner.write();
        let previous_token = match inner.rows.get(&row.id) {
            Some(previous) => previous.token_value.clone(),
            None => return Err(StoreError::NotFound(row.id.clone())),
        };

        row.completed_at = self.clock.now();
        if previous_token != row.token_value {
            if inner.token_values.get(&previous_token) == Some(&row.id) {
                inner.token_values.remove(&previous_token);
            }
            inner
                .token_values
                .insert(row.token_value.clone(), row.id.clone());
        }
        inner.rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.inner.read().rows.len())
    }
}

impl AuditStore for MemoryTokenStore {
    fn append_audit(&self, mut record: AuditRecord) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let id = inner.audits.len() as u64 + 1;
        record.id = id;
        inner.audits.push(record);
        Ok(id)
    }

    fn get_audit(&self, id: u64) -> StoreResult<Option<AuditRecord>> {
        let inner = self.inner.read();
        Ok(inner.audits.iter().find(|r| r.id == id).cloned())
    }

    fn audits_for_request(&self, request_id: &str) -> StoreResult<Vec<AuditRecord>> {
        let inner = self.inner.read();
        Ok(inner
            .audits
            .iter()
            .filter(|r| r.request_id.as_deref() == Some(request_id))
            .cloned()
            .collect())
    }
}
