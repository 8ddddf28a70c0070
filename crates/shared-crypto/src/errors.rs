//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
///
/// Failure kinds are deliberately coarse: a tag mismatch and a malformed
/// envelope are both `DecryptFailed`, so callers cannot leak which one
/// occurred.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("encryption failed")]
    EncryptFailed,

    /// Tag mismatch, truncated payload, or missing `enc:1:` prefix
    #[error("decryption failed")]
    DecryptFailed,

    /// Key or hash string does not parse into its expected shape
    #[error("invalid key format")]
    InvalidKeyFormat,

    /// A digest comparison failed
    #[error("hash mismatch")]
    HashMismatch,

    /// Keypair generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
