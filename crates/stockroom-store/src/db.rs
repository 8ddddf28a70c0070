//! # Database Handle
//!
//! A cloneable handle over one SQLite writer connection. SQLite serialises
//! writers anyway; a single connection behind a mutex keeps transaction
//! scopes honest and sidesteps `SQLITE_BUSY` juggling. Callers on async
//! executors run store work inside `spawn_blocking`.

use crate::StoreError;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, Transaction};
use std::sync::Arc;

/// Cloneable database handle.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and apply connection pragmas.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the file cannot be opened.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        if path == ":memory:" {
            return Self::open_in_memory();
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a fresh in-memory database (tests, `:memory:` deployments).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure(conn: &Connection) -> Result<(), StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }

    /// Run a closure against the connection.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }

    /// Run a closure inside an explicit transaction.
    ///
    /// The transaction commits when the closure returns `Ok` and rolls
    /// back (on drop) when it returns `Err`. The error type is generic so
    /// domain layers can roll back on business outcomes, not only on
    /// database failures.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&Transaction) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Lock the raw connection. For migrations only.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}
