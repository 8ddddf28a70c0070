//! # Shared Crypto Crate
//!
//! Cryptographic primitives for Stockroom.
//!
//! ## Modules
//!
//! - [`symmetric`]: AES-256-GCM with the versioned `enc:1:` envelope
//! - [`mac`]: HMAC-SHA256 and SHA-256 helpers
//! - [`compare`]: constant-time byte equality
//! - [`password`]: PBKDF2 password hashing (`pbkdf2:<iter>:<salt>:<hash>`)
//! - [`keyring`]: the KEK / DATA_KEY hierarchy and the process key cache
//! - [`asymmetric`]: RSA-OAEP-2048 keypairs with JWK serialisation
//! - [`token`]: random token and salt generation
//!
//! ## Security Properties
//!
//! - All key material is zeroized on drop
//! - Ciphertext comparisons and digest checks are constant-time
//! - Decryption is restricted to values carrying the `enc:1:` version prefix

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod asymmetric;
pub mod compare;
pub mod errors;
pub mod keyring;
pub mod mac;
pub mod password;
pub mod symmetric;
pub mod token;

pub use asymmetric::RsaKeyPair;
pub use compare::constant_time_eq;
pub use errors::CryptoError;
pub use keyring::{derive_kek, derive_session_key, unwrap_data_key, wrap_data_key, Kek, KeyCache};
pub use mac::{hmac_sha256, hmac_sha256_hex, sha256_hex};
pub use password::{hash_password, verify_password};
pub use symmetric::{decrypt_string, decrypt_value, encrypt_value, is_encrypted, DataKey, ENC_PREFIX};
pub use token::{generate_salt, generate_token};
