//! # Forward Migrations
//!
//! Each migration is a `(stamp, sql)` pair applied in order. The stamp of
//! the last applied migration is recorded in the `latest_db_update`
//! setting; startup applies everything newer. There is no down path.

use crate::settings::setting_keys::LATEST_DB_UPDATE;
use crate::{Database, StoreError};
use rusqlite::OptionalExtension;
use tracing::info;

/// Ordered migration list. Stamps are date-prefixed and must only grow.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "2025-01-10-initial",
        "CREATE TABLE IF NOT EXISTS products (
             id         TEXT PRIMARY KEY,
             sku        TEXT NOT NULL UNIQUE,
             name       TEXT NOT NULL,
             unit_price INTEGER NOT NULL CHECK (unit_price >= 0),
             stock      INTEGER NOT NULL CHECK (stock >= -1),
             active     INTEGER NOT NULL DEFAULT 1,
             created    TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS reservations (
             id                  TEXT PRIMARY KEY,
             product_id          TEXT NOT NULL REFERENCES products(id),
             quantity            INTEGER NOT NULL CHECK (quantity > 0),
             provider_session_id TEXT NOT NULL,
             status              TEXT NOT NULL
                 CHECK (status IN ('pending', 'confirmed', 'expired')),
             created             TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_reservations_session
             ON reservations (provider_session_id);
         CREATE INDEX IF NOT EXISTS idx_reservations_product_status
             ON reservations (product_id, status);
         CREATE TABLE IF NOT EXISTS processed_payments (
             provider_session_id TEXT PRIMARY KEY,
             processed_at        TEXT NOT NULL
         );",
    ),
    (
        "2025-01-10-accounts",
        "CREATE TABLE IF NOT EXISTS users (
             id               TEXT PRIMARY KEY,
             username_index   TEXT NOT NULL UNIQUE,
             username_hash    TEXT NOT NULL,
             password_hash    TEXT NOT NULL,
             kdf_salt         TEXT NOT NULL,
             wrapped_data_key TEXT NOT NULL,
             admin_level      TEXT NOT NULL,
             created          TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS sessions (
             token_hash       TEXT PRIMARY KEY,
             csrf_token       TEXT NOT NULL,
             expires          INTEGER NOT NULL,
             wrapped_data_key TEXT NOT NULL,
             user_id          TEXT NOT NULL REFERENCES users(id)
         );
         CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions (user_id);",
    ),
];

/// Apply all pending migrations.
///
/// The `settings` table is created unconditionally first so the marker has
/// somewhere to live on a fresh database.
///
/// # Errors
///
/// `StoreError::Migration` names the failing stamp; nothing after it runs.
pub fn migrate(db: &Database) -> Result<(), StoreError> {
    let conn = db.lock();
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;

    let applied: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [LATEST_DB_UPDATE],
            |r| r.get(0),
        )
        .optional()?;
    let applied = applied.unwrap_or_default();

    for (stamp, sql) in MIGRATIONS {
        if *stamp <= applied.as_str() {
            continue;
        }
        info!(stamp, "applying migration");
        conn.execute_batch(sql)
            .map_err(|source| StoreError::Migration { stamp, source })?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            [LATEST_DB_UPDATE, stamp],
        )?;
    }
    Ok(())
}
