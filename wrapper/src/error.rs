//! Error taxonomy exposed to the boundary layer.
//!
//! Four outcomes matter to a caller, and each has a different retry story:
//!
//! | Variant            | Meaning                                   | Retry?                   |
//! |--------------------|-------------------------------------------|--------------------------|
//! | `InvalidInput`     | Malformed timestamp, blank field, bad envelope | Never              |
//! | `Unauthenticated`  | Token unknown, expired, foreign, tampered | Never; reason only logged |
//! | `Conflict`         | Lost a uniqueness race on issuance        | Yes, by re-reading       |
//! | `StoreUnavailable` | Persistence failed                        | Fatal for the request    |

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::storage::StoreError;

/// Errors returned by the public operations of the core.
#[derive(Debug, Error)]
pub enum WrapperError {
    /// The caller sent something we cannot use.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A token was rejected. Deliberately carries no reason.
    #[error("invalid or expired transaction token")]
    Unauthenticated,

    /// A uniqueness constraint was violated during issuance.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The token store failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Key material in configuration is unusable.
    #[error("invalid key configuration: {0}")]
    Configuration(#[from] CryptoError),
}

impl From<StoreError> for WrapperError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => WrapperError::Conflict(what),
            other => WrapperError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type WrapperResult<T> = Result<T, WrapperError>;
