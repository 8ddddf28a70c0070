//! Store error types.

use shared_crypto::CryptoError;
use thiserror::Error;

/// Errors surfaced by the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The requested row does not exist
    #[error("row not found")]
    NotFound,

    /// A stored ciphertext failed to decrypt or encrypt
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// DATA_KEY has not been recovered by any login or setup yet
    #[error("encryption key unavailable")]
    KeyUnavailable,

    /// A migration statement failed
    #[error("migration failed at {stamp}: {source}")]
    Migration {
        /// The migration stamp that failed
        stamp: &'static str,
        /// The underlying error
        source: rusqlite::Error,
    },
}

impl StoreError {
    /// Whether this is a primary-key / uniqueness conflict.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
