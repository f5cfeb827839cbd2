//! # Configuration & Constants
//!
//! Every magic number in txnwrap lives here, next to the one piece of
//! runtime configuration the core needs: the key/IV material and the shared
//! transaction password.
//!
//! Configuration is an immutable value handed to each component when it is
//! built. Nothing in the core reads the environment or a global.

use std::fmt;

use chrono::Duration;

// ---------------------------------------------------------------------------
// Token Lifecycle
// ---------------------------------------------------------------------------

/// Freshness window in whole minutes. A token is reusable on re-issuance and
/// acceptable on validation while fewer than this many minutes have passed
/// since its business timestamp.
pub const FRESHNESS_WINDOW_MINUTES: i64 = 15;

/// Textual format of `transaction_timestamp`: second precision, no zone.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prefix of generated order references (`TXN20240101A1B2C3D4`).
pub const ORDER_REFERENCE_PREFIX: &str = "TXN";

/// Date part of an order reference.
pub const ORDER_REFERENCE_DATE_FORMAT: &str = "%Y%m%d";

/// Random suffix length of an order reference.
pub const ORDER_REFERENCE_SUFFIX_LEN: usize = 8;

/// Upper bound on audit payload length. Longer downstream bodies are cut.
pub const AUDIT_PAYLOAD_MAX_CHARS: usize = 4000;

// ---------------------------------------------------------------------------
// Cipher Parameters
// ---------------------------------------------------------------------------

/// Block size of AES, which is also the required IV length.
pub const AES_BLOCK_LENGTH: usize = 16;

/// Accepted AES key lengths (AES-128, AES-192, AES-256).
pub const AES_KEY_LENGTHS: [usize; 3] = [16, 24, 32];

/// The freshness window as a `chrono::Duration`.
pub fn freshness_window() -> Duration {
    Duration::minutes(FRESHNESS_WINDOW_MINUTES)
}

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// A key string and IV string for one logical purpose.
///
/// Both are opaque secret material; their UTF-8 bytes become the AES key
/// and IV. Validation happens when a [`crate::crypto::CipherKey`] is built.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub key: String,
    pub iv: String,
}

impl KeyMaterial {
    pub fn new(key: impl Into<String>, iv: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            iv: iv.into(),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"<redacted>")
            .field("iv", &"<redacted>")
            .finish()
    }
}

/// Everything the core needs from the outside world.
///
/// The payload pair is optional; when absent, envelopes are sealed with the
/// token pair.
#[derive(Clone)]
pub struct WrapperConfig {
    /// Key/IV used to encode transaction tokens.
    pub transaction: KeyMaterial,
    /// Key/IV used for request/response envelopes.
    pub payload: Option<KeyMaterial>,
    /// Shared password folded into every token plaintext.
    pub transaction_password: String,
}

impl WrapperConfig {
    /// Build a config that uses the same key/IV for tokens and payloads.
    pub fn new(
        transaction_key: impl Into<String>,
        transaction_iv: impl Into<String>,
        transaction_password: impl Into<String>,
    ) -> Self {
        Self {
            transaction: KeyMaterial::new(transaction_key, transaction_iv),
            payload: None,
            transaction_password: transaction_password.into(),
        }
    }

    /// Use a dedicated key/IV for payload envelopes.
    pub fn with_payload_key(mut self, key: impl Into<String>, iv: impl Into<String>) -> Self {
        self.payload = Some(KeyMaterial::new(key, iv));
        self
    }

    /// Build from optional payload parts, falling back per field to the
    /// transaction pair the way a partially filled environment would.
    pub fn with_payload_parts(mut self, key: Option<String>, iv: Option<String>) -> Self {
        if key.is_none() && iv.is_none() {
            return self;
        }
        self.payload = Some(KeyMaterial {
            key: key.unwrap_or_else(|| self.transaction.key.clone()),
            iv: iv.unwrap_or_else(|| self.transaction.iv.clone()),
        });
        self
    }

    /// The key/IV pair for payload envelopes after fallback.
    pub fn payload_key(&self) -> &KeyMaterial {
        self.payload.as_ref().unwrap_or(&self.transaction)
    }
}

impl fmt::Debug for WrapperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperConfig")
            .field("transaction", &self.transaction)
            .field("payload", &self.payload)
            .field("transaction_password", &"<redacted>")
            .finish()
    }
}
