//! # Payload Envelope
//!
//! Request and response bodies cross the wire as `{"encData": "<base64>"}`
//! where the base64 is the deterministic encryption of the plaintext JSON.
//! The envelope key is independent of the token key but falls back to it
//! when no payload key is configured.
//!
//! A body that won't decrypt came from the caller, so it is always an
//! `InvalidInput`, never an internal failure.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WrapperConfig;
use crate::crypto::{self, CipherKey};
use crate::error::{WrapperError, WrapperResult};

/// The on-the-wire wrapper for an encrypted JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBody {
    #[serde(rename = "encData", alias = "encryptedData")]
    pub enc_data: String,
}

/// Seals and opens JSON payloads.
#[derive(Debug, Clone)]
pub struct PayloadEnvelope {
    key: CipherKey,
}

impl PayloadEnvelope {
    /// Build from configuration, honoring the payload → transaction fallback.
    pub fn new(config: &WrapperConfig) -> WrapperResult<Self> {
        let key = CipherKey::from_material(config.payload_key())?;
        debug!(bits = key.bits(), "payload envelope ready");
        Ok(Self { key })
    }

    /// Encrypt a plaintext JSON string into an envelope string.
    pub fn encrypt_payload(&self, plain_json: &str) -> String {
        crypto::encrypt(plain_json, &self.key)
    }

    /// Decrypt an envelope string back into plaintext JSON.
    pub fn decrypt_payload(&self, envelope: &str) -> WrapperResult<String> {
        crypto::decrypt(envelope, &self.key).map_err(|e| {
            debug!(error = %e, "payload envelope rejected");
            WrapperError::InvalidInput("invalid encrypted payload".into())
        })
    }

    /// Serialize `value` and wrap it in an [`EncryptedBody`].
    pub fn seal_json<T: Serialize>(&self, value: &T) -> WrapperResult<EncryptedBody> {
        let plain = serde_json::to_string(value)
            .map_err(|e| WrapperError::InvalidInput(format!("unserializable payload: {e}")))?;
        Ok(self.seal_str(&plain))
    }

    /// Wrap an already-serialized JSON string.
    pub fn seal_str(&self, plain_json: &str) -> EncryptedBody {
        EncryptedBody {
            enc_data: self.encrypt_payload(plain_json),
        }
    }

    /// Decrypt and deserialize an [`EncryptedBody`].
    pub fn open_json<T: DeserializeOwned>(&self, body: &EncryptedBody) -> WrapperResult<T> {
        let plain = self.decrypt_payload(&body.enc_data)?;
        serde_json::from_str(&plain)
            .map_err(|e| WrapperError::InvalidInput(format!("malformed payload JSON: {e}")))
    }
}
