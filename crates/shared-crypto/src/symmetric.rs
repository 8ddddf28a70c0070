//! # Symmetric Encryption
//!
//! AES-256-GCM with a versioned string envelope.
//!
//! Encrypted values are stored as `enc:1:<base64(iv || ciphertext || tag)>`
//! with a 12-byte random IV and the 16-byte GCM tag appended by the AEAD.
//! Decryption refuses any value that does not carry the version prefix.

use crate::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

/// Version prefix for encrypted values at rest.
pub const ENC_PREFIX: &str = "enc:1:";

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A 256-bit symmetric key.
///
/// Used both as DATA_KEY (encrypting at-rest secrets) and, via
/// [`crate::keyring::Kek`], as a key-encryption key.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct DataKey([u8; 32]);

impl DataKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Decode from standard base64 (the environment root key format).
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|_| CryptoError::InvalidKeyFormat)?;
        let bytes: [u8; 32] = raw.try_into().map_err(|_| CryptoError::InvalidKeyFormat)?;
        Ok(Self(bytes))
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(..)")
    }
}

/// Whether a stored value carries the encryption envelope.
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENC_PREFIX)
}

/// Encrypt plaintext into the `enc:1:` envelope.
///
/// # Errors
///
/// Returns `CryptoError::EncryptFailed` if the AEAD rejects the input.
pub fn encrypt_value(key: &DataKey, plaintext: &[u8]) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::EncryptFailed)?;

    let mut payload = Vec::with_capacity(IV_LEN + ciphertext.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(&ciphertext);

    Ok(format!("{ENC_PREFIX}{}", BASE64.encode(payload)))
}

/// Decrypt an `enc:1:` envelope back to plaintext bytes.
///
/// # Errors
///
/// Returns `CryptoError::DecryptFailed` for a missing prefix, malformed
/// base64, truncated payload, or GCM tag mismatch.
pub fn decrypt_value(key: &DataKey, value: &str) -> Result<Vec<u8>, CryptoError> {
    let encoded = value
        .strip_prefix(ENC_PREFIX)
        .ok_or(CryptoError::DecryptFailed)?;
    let payload = BASE64
        .decode(encoded)
        .map_err(|_| CryptoError::DecryptFailed)?;
    if payload.len() < IV_LEN + TAG_LEN {
        return Err(CryptoError::DecryptFailed);
    }

    let (iv, ciphertext) = payload.split_at(IV_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::DecryptFailed)
}

/// Decrypt an `enc:1:` envelope into UTF-8 text.
///
/// # Errors
///
/// As [`decrypt_value`]; non-UTF-8 plaintext is also `DecryptFailed`.
pub fn decrypt_string(key: &DataKey, value: &str) -> Result<String, CryptoError> {
    let plaintext = decrypt_value(key, value)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailed)
}
