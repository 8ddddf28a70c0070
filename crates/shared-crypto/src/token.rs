//! Random token and salt generation from the OS RNG.

use rand::{rngs::OsRng, RngCore};

/// Generate a 32-byte random token, hex-encoded (64 chars).
///
/// Used for session tokens and CSRF tokens.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a 16-byte random salt for key derivation.
pub fn generate_salt() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
