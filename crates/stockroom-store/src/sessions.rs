//! # Session Store
//!
//! Hashed-token session rows with a small read-through LRU cache. The
//! cache exists because every authenticated request resolves its session;
//! its TTL is short enough that a password change (which deletes all
//! rows and clears the cache) is visible within ten seconds even across
//! executors.

use crate::{time, Database, StoreError};
use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::{OptionalExtension, Row};
use shared_types::Session;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Bounded cache size.
const CACHE_CAPACITY: usize = 1024;

/// Cache entry freshness window.
const CACHE_TTL: Duration = Duration::from_secs(10);

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        token_hash: row.get(0)?,
        csrf_token: row.get(1)?,
        expires: row.get(2)?,
        wrapped_data_key: row.get(3)?,
        user_id: row.get(4)?,
    })
}

/// Store over the `sessions` table.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    cache: Arc<Mutex<LruCache<String, (Session, Instant)>>>,
}

impl SessionStore {
    /// Create a store over the given database.
    pub fn new(db: Database) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).expect("nonzero capacity");
        Self {
            db,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Insert a session row.
    pub fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.db.with(|c| {
            c.execute(
                "INSERT INTO sessions (token_hash, csrf_token, expires, wrapped_data_key, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    session.token_hash,
                    session.csrf_token,
                    session.expires,
                    session.wrapped_data_key,
                    session.user_id,
                ],
            )
        })?;
        Ok(())
    }

    /// Resolve a session by hashed token.
    ///
    /// An expired row is deleted opportunistically and reported as absent.
    pub fn get(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        let now_ms = time::now_ms();

        if let Some((session, cached_at)) = self.cache.lock().get(token_hash).cloned() {
            if cached_at.elapsed() < CACHE_TTL && !session.is_expired(now_ms) {
                return Ok(Some(session));
            }
        }

        let session: Option<Session> = self.db.with(|c| {
            c.query_row(
                "SELECT token_hash, csrf_token, expires, wrapped_data_key, user_id
                 FROM sessions WHERE token_hash = ?1",
                [token_hash],
                row_to_session,
            )
            .optional()
        })?;

        let Some(session) = session else {
            self.cache.lock().pop(token_hash);
            return Ok(None);
        };

        if session.is_expired(now_ms) {
            self.cache.lock().pop(token_hash);
            if let Err(e) = self.delete(token_hash) {
                debug!(error = %e, "expired session purge failed");
            }
            return Ok(None);
        }

        self.cache
            .lock()
            .put(token_hash.to_string(), (session.clone(), Instant::now()));
        Ok(Some(session))
    }

    /// Delete one session (logout).
    pub fn delete(&self, token_hash: &str) -> Result<(), StoreError> {
        self.cache.lock().pop(token_hash);
        self.db
            .with(|c| c.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash]))?;
        Ok(())
    }

    /// Delete every session (password change). Returns the row count.
    pub fn delete_all(&self) -> Result<usize, StoreError> {
        self.cache.lock().clear();
        let deleted = self.db.with(|c| c.execute("DELETE FROM sessions", []))?;
        Ok(deleted)
    }

    /// Remove rows past their expiry. Returns the row count.
    pub fn sweep_expired(&self) -> Result<usize, StoreError> {
        let deleted = self
            .db
            .with(|c| c.execute("DELETE FROM sessions WHERE expires <= ?1", [time::now_ms()]))?;
        if deleted > 0 {
            self.cache.lock().clear();
        }
        Ok(deleted)
    }
}
