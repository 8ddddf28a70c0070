//! # Password Hashing
//!
//! PBKDF2-HMAC-SHA256 password hashes in the self-describing string form
//! `pbkdf2:<iterations>:<salt-hex>:<hash-hex>`. Verification re-derives
//! with the embedded parameters and compares constant-time.

use crate::compare::constant_time_eq;
use crate::token::generate_salt;
use crate::CryptoError;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

/// Default PBKDF2 iteration count for new hashes.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const HASH_LEN: usize = 32;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    hash_password_with_iterations(password, PBKDF2_ITERATIONS)
}

/// Hash a password with an explicit iteration count.
///
/// The count is embedded in the output string, so hashes created with
/// different costs verify transparently.
pub fn hash_password_with_iterations(password: &str, iterations: u32) -> String {
    let salt = generate_salt();
    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);
    format!(
        "pbkdf2:{}:{}:{}",
        iterations,
        hex::encode(salt),
        hex::encode(hash)
    )
}

/// Verify a password against a stored `pbkdf2:` string.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyFormat` when the stored string does not
/// parse. A well-formed string with a non-matching password yields
/// `Ok(false)`, not an error.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CryptoError> {
    let mut parts = stored.split(':');
    let (scheme, iterations, salt_hex, hash_hex) = match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some(scheme), Some(iterations), Some(salt), Some(hash), None) => {
            (scheme, iterations, salt, hash)
        }
        _ => return Err(CryptoError::InvalidKeyFormat),
    };
    if scheme != "pbkdf2" {
        return Err(CryptoError::InvalidKeyFormat);
    }

    let iterations: u32 = iterations
        .parse()
        .map_err(|_| CryptoError::InvalidKeyFormat)?;
    if iterations == 0 {
        return Err(CryptoError::InvalidKeyFormat);
    }
    let salt = hex::decode(salt_hex).map_err(|_| CryptoError::InvalidKeyFormat)?;
    let expected = hex::decode(hash_hex).map_err(|_| CryptoError::InvalidKeyFormat)?;
    if expected.len() != HASH_LEN {
        return Err(CryptoError::InvalidKeyFormat);
    }

    let mut derived = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);

    Ok(constant_time_eq(&derived, &expected))
}
