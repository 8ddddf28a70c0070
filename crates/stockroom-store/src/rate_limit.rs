//! # IP-Hashed Rate Limiter
//!
//! A reusable per-scope limiter over `(hashed_ip, attempts, locked_until)`
//! rows. The caller supplies a raw IP; the limiter HMACs it under the
//! process root key so plaintext addresses never persist. Expired lockout
//! rows are purged opportunistically on interaction.

use crate::{time, Database, StoreError};
use rusqlite::OptionalExtension;
use shared_crypto::hmac_sha256_hex;
use std::time::Duration;
use tracing::debug;

/// Attempt ceiling and lockout window for one scope.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Attempts at which the lock engages.
    pub max_attempts: u32,
    /// How long a lock lasts.
    pub lockout: Duration,
}

impl RateLimitPolicy {
    /// Login scope default: 5 attempts, 15 minute lockout.
    pub fn login() -> Self {
        Self {
            max_attempts: 5,
            lockout: Duration::from_secs(15 * 60),
        }
    }

    /// Checkout scope default: 20 attempts, 5 minute lockout.
    pub fn checkout() -> Self {
        Self {
            max_attempts: 20,
            lockout: Duration::from_secs(5 * 60),
        }
    }
}

/// Limiter over one `<scope>_rate_limits` table.
#[derive(Clone)]
pub struct RateLimiter {
    db: Database,
    hmac_key: Vec<u8>,
    table: String,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    /// Create a limiter for `scope`, creating its table on first use.
    ///
    /// # Errors
    ///
    /// Rejects scope names that are not `[a-z_]` (the scope is interpolated
    /// into the table name) and propagates table-creation failures.
    pub fn new(
        db: Database,
        hmac_key: &[u8],
        scope: &str,
        policy: RateLimitPolicy,
    ) -> Result<Self, StoreError> {
        if scope.is_empty() || !scope.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            return Err(StoreError::NotFound);
        }
        let table = format!("{scope}_rate_limits");
        db.with(|c| {
            c.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                         hashed_ip    TEXT PRIMARY KEY,
                         attempts     INTEGER NOT NULL DEFAULT 0,
                         locked_until INTEGER
                     )"
                ),
                [],
            )
        })?;
        Ok(Self {
            db,
            hmac_key: hmac_key.to_vec(),
            table,
            policy,
        })
    }

    fn hash_ip(&self, ip: &str) -> String {
        hmac_sha256_hex(&self.hmac_key, ip.as_bytes())
    }

    /// Whether this IP is currently locked out.
    ///
    /// An expired lock row is deleted as a side effect; that delete never
    /// fails the caller.
    pub fn is_rate_limited(&self, ip: &str) -> Result<bool, StoreError> {
        let hashed = self.hash_ip(ip);
        let now = time::now_ms();

        let locked_until: Option<Option<i64>> = self.db.with(|c| {
            c.query_row(
                &format!("SELECT locked_until FROM {} WHERE hashed_ip = ?1", self.table),
                [&hashed],
                |r| r.get(0),
            )
            .optional()
        })?;

        match locked_until {
            Some(Some(until)) if until > now => Ok(true),
            Some(Some(_)) => {
                // Lock has lapsed; the row is stale.
                if let Err(e) = self.db.with(|c| {
                    c.execute(
                        &format!("DELETE FROM {} WHERE hashed_ip = ?1", self.table),
                        [&hashed],
                    )
                }) {
                    debug!(table = %self.table, error = %e, "expired lock purge failed");
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Record a failed or throttled attempt. Returns whether the lock
    /// engaged (or was already engaged) for this IP.
    pub fn record_attempt(&self, ip: &str) -> Result<bool, StoreError> {
        let hashed = self.hash_ip(ip);
        let now = time::now_ms();
        let table = &self.table;

        // Opportunistic purge of every lapsed lock in the table.
        if let Err(e) = self.db.with(|c| {
            c.execute(
                &format!("DELETE FROM {table} WHERE locked_until IS NOT NULL AND locked_until <= ?1"),
                [now],
            )
        }) {
            debug!(table = %table, error = %e, "rate-limit purge failed");
        }

        let max = i64::from(self.policy.max_attempts);
        let lockout_ms = self.policy.lockout.as_millis() as i64;

        self.db.transaction(|tx| {
            tx.execute(
                &format!(
                    "INSERT INTO {table} (hashed_ip, attempts, locked_until)
                     VALUES (?1, 1, NULL)
                     ON CONFLICT (hashed_ip) DO UPDATE SET attempts = attempts + 1"
                ),
                [&hashed],
            )?;
            let attempts: i64 = tx.query_row(
                &format!("SELECT attempts FROM {table} WHERE hashed_ip = ?1"),
                [&hashed],
                |r| r.get(0),
            )?;
            if attempts >= max {
                tx.execute(
                    &format!("UPDATE {table} SET locked_until = ?2 WHERE hashed_ip = ?1"),
                    rusqlite::params![hashed, now + lockout_ms],
                )?;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    /// Forget this IP entirely (successful login, completed checkout).
    pub fn clear_attempts(&self, ip: &str) -> Result<(), StoreError> {
        let hashed = self.hash_ip(ip);
        self.db.with(|c| {
            c.execute(
                &format!("DELETE FROM {} WHERE hashed_ip = ?1", self.table),
                [&hashed],
            )
        })?;
        Ok(())
    }
}
