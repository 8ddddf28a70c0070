//! # Key Hierarchy
//!
//! Three keys layer as:
//!
//! ```text
//! KEK        = PBKDF2(password, per-user salt)      never persisted
//! DATA_KEY   = random AES-256-GCM key at setup      never persisted unwrapped
//! wrapped    = AES-GCM(DATA_KEY) under KEK          stored on the user row
//! ```
//!
//! At login the KEK is derived once, DATA_KEY unwrapped from the user row,
//! and a second wrapping of DATA_KEY (under a session-token-derived key) is
//! stored on the session row. Subsequent requests recover DATA_KEY from the
//! session wrapping; the KEK exists only inside login, setup, and
//! password-change frames.

use crate::symmetric::{decrypt_value, encrypt_value, DataKey};
use crate::CryptoError;
use parking_lot::RwLock;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

/// Iterations for password-derived KEKs.
const KEK_ITERATIONS: u32 = 100_000;

/// Iterations for session-token-derived keys. The token is already
/// 256 bits of OS randomness, so stretching buys nothing beyond domain
/// separation from the raw token.
const SESSION_KEY_ITERATIONS: u32 = 10_000;

/// A key-encryption key. Only ever wraps and unwraps DATA_KEY.
pub struct Kek(DataKey);

/// Derive a KEK from a password and the user's stored salt.
pub fn derive_kek(password: &str, salt: &[u8]) -> Kek {
    Kek(derive(password.as_bytes(), salt, KEK_ITERATIONS))
}

/// Derive a wrapping key from a session token and the same salt.
pub fn derive_session_key(token: &str, salt: &[u8]) -> Kek {
    Kek(derive(token.as_bytes(), salt, SESSION_KEY_ITERATIONS))
}

fn derive(secret: &[u8], salt: &[u8], iterations: u32) -> DataKey {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut out);
    DataKey::from_bytes(out)
}

/// Wrap DATA_KEY under a KEK, producing an `enc:1:` envelope string.
pub fn wrap_data_key(data_key: &DataKey, kek: &Kek) -> Result<String, CryptoError> {
    encrypt_value(&kek.0, data_key.as_bytes())
}

/// Unwrap DATA_KEY from its envelope.
///
/// # Errors
///
/// `CryptoError::DecryptFailed`: indistinguishable between a wrong
/// password and a corrupted wrapping, which is what login wants.
pub fn unwrap_data_key(wrapped: &str, kek: &Kek) -> Result<DataKey, CryptoError> {
    let raw = decrypt_value(&kek.0, wrapped)?;
    let bytes: [u8; 32] = raw.try_into().map_err(|_| CryptoError::DecryptFailed)?;
    Ok(DataKey::from_bytes(bytes))
}

/// The process-wide DATA_KEY cache.
///
/// A single slot: there is exactly one DATA_KEY per deployment. Populated
/// at setup and at every successful login or session recovery; read by
/// unauthenticated paths (webhook secret decryption) that have no session
/// to derive from. Cleared on shutdown.
#[derive(Default)]
pub struct KeyCache {
    slot: RwLock<Option<DataKey>>,
}

impl KeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the recovered DATA_KEY.
    pub fn store(&self, key: DataKey) {
        *self.slot.write() = Some(key);
    }

    /// Get a copy of the cached DATA_KEY, if any request has recovered it
    /// since process start.
    pub fn get(&self) -> Option<DataKey> {
        self.slot.read().clone()
    }

    /// Drop the cached key.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }
}
