//! # Deterministic AES-CBC
//!
//! The one symmetric primitive of txnwrap. It encrypts UTF-8 strings and
//! returns standard base64 (with padding); decryption is the exact inverse.
//!
//! ## Key material
//!
//! Key and IV arrive as strings from configuration. Their UTF-8 bytes are used
//! directly: a 16, 24 or 32 byte key selects AES-128, AES-192 or AES-256, and
//! the IV must be exactly one block (16 bytes). Lengths are checked once, when
//! the [`CipherKey`] is built, so encrypt never fails at request time.
//!
//! ## Wire format
//!
//! `base64(AES-CBC(key, iv, PKCS7(plaintext)))`. No nonce prefix, no tag.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

use crate::config::{KeyMaterial, AES_BLOCK_LENGTH, AES_KEY_LENGTHS};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Errors from the cipher.
///
/// Decrypt failures are deliberately coarse: a wrong key and a corrupted
/// ciphertext both surface as `DecryptFailed`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: {0} bytes (expected one of {AES_KEY_LENGTHS:?})")]
    InvalidKeyLength(usize),

    #[error("invalid IV length: {0} bytes (expected {AES_BLOCK_LENGTH})")]
    InvalidIvLength(usize),

    #[error("ciphertext is not valid base64")]
    Base64,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("decrypted bytes are not valid UTF-8")]
    Utf8,
}

/// Key bytes, sized by AES variant.
#[derive(Clone)]
enum KeyBytes {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

/// A validated key/IV pair.
///
/// Immutable and cheap to clone. Safe to share across threads; every call
/// builds a fresh cipher instance.
#[derive(Clone)]
pub struct CipherKey {
    key: KeyBytes,
    iv: [u8; AES_BLOCK_LENGTH],
}

impl CipherKey {
    /// Validate raw key and IV bytes.
    pub fn from_bytes(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let invalid_key = |_| CryptoError::InvalidKeyLength(key.len());
        let key = match key.len() {
            16 => KeyBytes::Aes128(key.try_into().map_err(invalid_key)?),
            24 => KeyBytes::Aes192(key.try_into().map_err(invalid_key)?),
            32 => KeyBytes::Aes256(key.try_into().map_err(invalid_key)?),
            other => return Err(CryptoError::InvalidKeyLength(other)),
        };
        let iv: [u8; AES_BLOCK_LENGTH] = iv
            .try_into()
            .map_err(|_| CryptoError::InvalidIvLength(iv.len()))?;
        Ok(Self { key, iv })
    }

    /// Validate string key material from configuration.
    pub fn from_material(material: &KeyMaterial) -> Result<Self, CryptoError> {
        Self::from_bytes(material.key.as_bytes(), material.iv.as_bytes())
    }

    /// Key size in bits, for logging.
    pub fn bits(&self) -> usize {
        match self.key {
            KeyBytes::Aes128(_) => 128,
            KeyBytes::Aes192(_) => 192,
            KeyBytes::Aes256(_) => 256,
        }
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CipherKey(AES-{}-CBC)", self.bits())
    }
}

/// Encrypt `plaintext` and return base64 ciphertext.
///
/// # Example
///
/// ```
/// use txnwrap::crypto::{decrypt, encrypt, CipherKey};
///
/// let key = CipherKey::from_bytes(b"0123456789abcdef", b"fedcba9876543210").unwrap();
/// let sealed = encrypt("hello", &key);
/// assert_eq!(sealed, encrypt("hello", &key));
/// assert_eq!(decrypt(&sealed, &key).unwrap(), "hello");
/// ```
pub fn encrypt(plaintext: &str, key: &CipherKey) -> String {
    let data = plaintext.as_bytes();
    let iv = key.iv.into();
    let ciphertext = match &key.key {
        KeyBytes::Aes128(k) => {
            Aes128CbcEnc::new(&(*k).into(), &iv).encrypt_padded_vec_mut::<Pkcs7>(data)
        }
        KeyBytes::Aes192(k) => {
            Aes192CbcEnc::new(&(*k).into(), &iv).encrypt_padded_vec_mut::<Pkcs7>(data)
        }
        KeyBytes::Aes256(k) => {
            Aes256CbcEnc::new(&(*k).into(), &iv).encrypt_padded_vec_mut::<Pkcs7>(data)
        }
    };
    BASE64.encode(ciphertext)
}

/// Decrypt base64 ciphertext produced by [`encrypt`].
///
/// # Errors
///
/// - `Base64` when the input isn't standard base64.
/// - `DecryptFailed` when the length is not a whole number of blocks or the
///   padding doesn't verify (wrong key, wrong IV, tampered bytes).
/// - `Utf8` when the recovered bytes are not a string.
pub fn decrypt(ciphertext: &str, key: &CipherKey) -> Result<String, CryptoError> {
    let data = BASE64
        .decode(ciphertext.trim())
        .map_err(|_| CryptoError::Base64)?;
    if data.is_empty() || data.len() % AES_BLOCK_LENGTH != 0 {
        return Err(CryptoError::DecryptFailed);
    }

    let iv = key.iv.into();
    let plaintext = match &key.key {
        KeyBytes::Aes128(k) => {
            Aes128CbcDec::new(&(*k).into(), &iv).decrypt_padded_vec_mut::<Pkcs7>(&data)
        }
        KeyBytes::Aes192(k) => {
            Aes192CbcDec::new(&(*k).into(), &iv).decrypt_padded_vec_mut::<Pkcs7>(&data)
        }
        KeyBytes::Aes256(k) => {
            Aes256CbcDec::new(&(*k).into(), &iv).decrypt_padded_vec_mut::<Pkcs7>(&data)
        }
    }
    .map_err(|_| CryptoError::DecryptFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
}
