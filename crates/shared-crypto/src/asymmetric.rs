//! # Asymmetric Encryption
//!
//! RSA-OAEP-2048 keypairs for tenant order data. Private keys serialise to
//! JWK JSON so they can be stored (encrypted under DATA_KEY) in the
//! settings table and re-imported after a restart.

use crate::CryptoError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const RSA_BITS: usize = 2048;

/// A generated RSA-OAEP keypair.
pub struct RsaKeyPair {
    /// The private half.
    pub private: RsaPrivateKey,
    /// The public half.
    pub public: RsaPublicKey,
}

impl RsaKeyPair {
    /// Generate a fresh 2048-bit keypair.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyGeneration` if prime generation fails.
    pub fn generate() -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }
}

/// Minimal RSA JWK (RFC 7518 §6.3). Private members are present only for
/// private keys; two-prime keys only.
#[derive(Serialize, Deserialize)]
struct RsaJwk {
    kty: String,
    n: String,
    e: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<String>,
}

fn b64(n: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(n.to_bytes_be())
}

fn unb64(s: &str) -> Result<BigUint, CryptoError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| CryptoError::InvalidKeyFormat)?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Serialise a private key to JWK JSON.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyFormat` for keys with more than two
/// primes (never produced by [`RsaKeyPair::generate`]).
pub fn private_key_to_jwk(key: &RsaPrivateKey) -> Result<String, CryptoError> {
    let primes = key.primes();
    if primes.len() != 2 {
        return Err(CryptoError::InvalidKeyFormat);
    }
    let jwk = RsaJwk {
        kty: "RSA".to_string(),
        n: b64(key.n()),
        e: b64(key.e()),
        d: Some(b64(key.d())),
        p: Some(b64(&primes[0])),
        q: Some(b64(&primes[1])),
    };
    serde_json::to_string(&jwk).map_err(|_| CryptoError::InvalidKeyFormat)
}

/// Re-import a private key from JWK JSON.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyFormat` when members are absent,
/// malformed, or inconsistent.
pub fn private_key_from_jwk(jwk: &str) -> Result<RsaPrivateKey, CryptoError> {
    let jwk: RsaJwk = serde_json::from_str(jwk).map_err(|_| CryptoError::InvalidKeyFormat)?;
    if jwk.kty != "RSA" {
        return Err(CryptoError::InvalidKeyFormat);
    }
    let (d, p, q) = match (jwk.d, jwk.p, jwk.q) {
        (Some(d), Some(p), Some(q)) => (d, p, q),
        _ => return Err(CryptoError::InvalidKeyFormat),
    };
    RsaPrivateKey::from_components(
        unb64(&jwk.n)?,
        unb64(&jwk.e)?,
        unb64(&d)?,
        vec![unb64(&p)?, unb64(&q)?],
    )
    .map_err(|_| CryptoError::InvalidKeyFormat)
}

/// Serialise a public key to JWK JSON.
pub fn public_key_to_jwk(key: &RsaPublicKey) -> Result<String, CryptoError> {
    let jwk = RsaJwk {
        kty: "RSA".to_string(),
        n: b64(key.n()),
        e: b64(key.e()),
        d: None,
        p: None,
        q: None,
    };
    serde_json::to_string(&jwk).map_err(|_| CryptoError::InvalidKeyFormat)
}

/// Re-import a public key from JWK JSON.
pub fn public_key_from_jwk(jwk: &str) -> Result<RsaPublicKey, CryptoError> {
    let jwk: RsaJwk = serde_json::from_str(jwk).map_err(|_| CryptoError::InvalidKeyFormat)?;
    if jwk.kty != "RSA" {
        return Err(CryptoError::InvalidKeyFormat);
    }
    RsaPublicKey::new(unb64(&jwk.n)?, unb64(&jwk.e)?).map_err(|_| CryptoError::InvalidKeyFormat)
}

/// Encrypt under RSA-OAEP-SHA256.
pub fn encrypt(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|_| CryptoError::EncryptFailed)
}

/// Decrypt under RSA-OAEP-SHA256.
pub fn decrypt(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    key.decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| CryptoError::DecryptFailed)
}
