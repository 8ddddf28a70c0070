//! # Settings Store
//!
//! A single `(key, value)` table. A fixed allow-list of recognised keys
//! holds provider credentials whose values are encrypted under DATA_KEY on
//! write and decrypted on read; everything else is stored verbatim.

use crate::{Database, StoreError};
use rusqlite::OptionalExtension;
use shared_crypto::{decrypt_string, encrypt_value, KeyCache};
use std::sync::Arc;

/// The recognised setting keys.
pub mod setting_keys {
    /// Set to `"1"` once initial setup has run.
    pub const SETUP_COMPLETE: &str = "setup_complete";
    /// ISO-4217 currency for checkout sessions.
    pub const CURRENCY_CODE: &str = "currency_code";
    /// RSA private key JWK, encrypted under DATA_KEY.
    pub const WRAPPED_PRIVATE_KEY: &str = "wrapped_private_key";
    /// RSA public key JWK, plaintext.
    pub const PUBLIC_KEY: &str = "public_key";
    /// Active provider: `stripe` or `square`.
    pub const PAYMENT_PROVIDER: &str = "payment_provider";
    /// Stripe API secret key (encrypted).
    pub const STRIPE_SECRET_KEY: &str = "stripe_secret_key";
    /// Stripe webhook signing secret (encrypted).
    pub const STRIPE_WEBHOOK_SECRET: &str = "stripe_webhook_secret";
    /// Stripe webhook endpoint id.
    pub const STRIPE_WEBHOOK_ENDPOINT_ID: &str = "stripe_webhook_endpoint_id";
    /// Square access token (encrypted).
    pub const SQUARE_ACCESS_TOKEN: &str = "square_access_token";
    /// Square location id.
    pub const SQUARE_LOCATION_ID: &str = "square_location_id";
    /// Square webhook signature key (encrypted).
    pub const SQUARE_WEBHOOK_SIGNATURE_KEY: &str = "square_webhook_signature_key";
    /// Outbound order-notification target URL.
    pub const WEBHOOK_URL: &str = "webhook_url";
    /// Comma-separated CORS origins for the public API.
    pub const ALLOWED_ORIGINS: &str = "allowed_origins";
    /// Stamp of the last applied migration.
    pub const LATEST_DB_UPDATE: &str = "latest_db_update";
}

/// Keys whose values are ciphertext at rest.
const ENCRYPTED_KEYS: &[&str] = &[
    setting_keys::WRAPPED_PRIVATE_KEY,
    setting_keys::STRIPE_SECRET_KEY,
    setting_keys::STRIPE_WEBHOOK_SECRET,
    setting_keys::SQUARE_ACCESS_TOKEN,
    setting_keys::SQUARE_WEBHOOK_SIGNATURE_KEY,
];

fn is_encrypted_key(key: &str) -> bool {
    ENCRYPTED_KEYS.contains(&key)
}

/// Store over the `settings` table.
#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
    keys: Arc<KeyCache>,
}

impl SettingsStore {
    /// Create a store; `keys` supplies DATA_KEY for the encrypted subset.
    pub fn new(db: Database, keys: Arc<KeyCache>) -> Self {
        Self { db, keys }
    }

    /// Read a setting.
    ///
    /// # Errors
    ///
    /// For a recognised encrypted key: `StoreError::KeyUnavailable` when
    /// DATA_KEY has not been recovered, `StoreError::Crypto` when the
    /// stored value fails to decrypt. Never silently returns ciphertext
    /// or an empty string.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = self.db.with(|c| {
            c.query_row("SELECT value FROM settings WHERE key = ?1", [key], |r| {
                r.get(0)
            })
            .optional()
        })?;

        let Some(value) = value else {
            return Ok(None);
        };
        if !is_encrypted_key(key) {
            return Ok(Some(value));
        }

        let data_key = self.keys.get().ok_or(StoreError::KeyUnavailable)?;
        Ok(Some(decrypt_string(&data_key, &value)?))
    }

    /// Write a setting (last-writer-wins on the primary key).
    ///
    /// # Errors
    ///
    /// As [`SettingsStore::get`] for the encrypted subset.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let stored = if is_encrypted_key(key) {
            let data_key = self.keys.get().ok_or(StoreError::KeyUnavailable)?;
            encrypt_value(&data_key, value.as_bytes())?
        } else {
            value.to_string()
        };
        self.db.with(|c| {
            c.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value",
                [key, stored.as_str()],
            )
        })?;
        Ok(())
    }

    /// Delete a setting.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.db
            .with(|c| c.execute("DELETE FROM settings WHERE key = ?1", [key]))?;
        Ok(())
    }
}
