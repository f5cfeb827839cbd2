// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # txnwrap — Core Library
//!
//! Short-lived transaction tokens and encrypted payload envelopes for a
//! payment gateway that refuses to put plaintext JSON on the wire.
//!
//! A token binds a (client, merchant transaction, timestamp, processor)
//! tuple. It is nothing more than the deterministic encryption of those
//! fields plus a shared password, which means the same primitive that wraps
//! request bodies also doubles as the token format and its integrity check.
//!
//! ## Architecture
//!
//! - **config** — Constants and the injected key/IV configuration.
//! - **crypto** — Deterministic AES-CBC over UTF-8 strings, base64 output.
//! - **envelope** — Whole-payload wrapping for request/response bodies.
//! - **token** — Issuance (idempotent inside the window) and validation.
//! - **storage** — Token store trait, sled and in-memory backends, audit log.
//! - **clock** — Wall clock abstraction so freshness can be tested.
//! - **error** — The error taxonomy exposed to the boundary layer.
//!
//! ## Quick tour
//!
//! ```
//! use std::sync::Arc;
//! use txnwrap::config::WrapperConfig;
//! use txnwrap::storage::MemoryTokenStore;
//! use txnwrap::token::{IssueRequest, TokenService};
//!
//! let config = WrapperConfig::new(
//!     "0123456789abcdef0123456789abcdef",
//!     "abcdef9876543210",
//!     "s3cret",
//! );
//! let service = TokenService::new(&config, Arc::new(MemoryTokenStore::new())).unwrap();
//!
//! let now = chrono::Local::now().naive_local();
//! let token = service
//!     .issue(&IssueRequest {
//!         client_id: "C1".into(),
//!         processor: "razorpay".into(),
//!         transaction_user_id: "U1".into(),
//!         transaction_merchant_id: "M1".into(),
//!         transaction_timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
//!     })
//!     .unwrap();
//! assert!(service.validate(&token, Some("C1"), Some("RAZORPAY")));
//! ```

pub mod clock;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod storage;
pub mod token;

pub use error::{WrapperError, WrapperResult};
