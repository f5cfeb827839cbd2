//! # Cryptographic Primitives
//!
//! Two things live here, and both are thin wrappers around audited RustCrypto
//! implementations:
//!
//! - **cipher** — deterministic AES-CBC/PKCS#7 with a fixed key and IV per
//!   logical purpose. Same plaintext in, same base64 ciphertext out. That
//!   property is load-bearing: tokens are compared and re-derived by value.
//! - **hash** — SHA-256 hex digests for audit records.
//!
//! ## On determinism
//!
//! A fixed IV means equal plaintexts produce equal ciphertexts and there is
//! no MAC beyond PKCS#7 padding. This is the token format the gateway's
//! callers already depend on, so it is reproduced exactly. Don't reuse
//! [`CipherKey`] for anything that needs semantic security.

pub mod cipher;
pub mod hash;

pub use cipher::{decrypt, encrypt, CipherKey, CryptoError};
pub use hash::sha256_hex;
