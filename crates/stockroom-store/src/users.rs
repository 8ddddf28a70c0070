//! # User Store
//!
//! Administrator account rows. The store moves opaque strings; all
//! encryption and HMAC indexing happens in the auth layer above, so the
//! store itself never sees a plaintext username or password.

use crate::{time, Database, StoreError};
use rusqlite::{OptionalExtension, Row};
use shared_types::User;

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username_index: row.get(1)?,
        username_hash: row.get(2)?,
        password_hash: row.get(3)?,
        kdf_salt: row.get(4)?,
        wrapped_data_key: row.get(5)?,
        admin_level: row.get(6)?,
        created: time::from_iso(&row.get::<_, String>(7)?).unwrap_or_default(),
    })
}

const USER_COLS: &str =
    "id, username_index, username_hash, password_hash, kdf_salt, wrapped_data_key, admin_level, created";

/// Store over the `users` table.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    /// Create a store over the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a user row.
    ///
    /// # Errors
    ///
    /// A duplicate `username_index` surfaces as a uniqueness violation.
    pub fn insert(&self, user: &User) -> Result<(), StoreError> {
        self.db.with(|c| {
            c.execute(
                "INSERT INTO users
                     (id, username_index, username_hash, password_hash, kdf_salt,
                      wrapped_data_key, admin_level, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    user.id,
                    user.username_index,
                    user.username_hash,
                    user.password_hash,
                    user.kdf_salt,
                    user.wrapped_data_key,
                    user.admin_level,
                    time::to_iso(user.created),
                ],
            )
        })?;
        Ok(())
    }

    /// Look a user up by the HMAC username index.
    pub fn find_by_username_index(&self, index: &str) -> Result<Option<User>, StoreError> {
        self.db.with(|c| {
            c.query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE username_index = ?1"),
                [index],
                row_to_user,
            )
            .optional()
        })
    }

    /// Fetch by id.
    pub fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.db.with(|c| {
            c.query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
                [id],
                row_to_user,
            )
            .optional()
        })
    }

    /// Number of user rows (setup guard).
    pub fn count(&self) -> Result<i64, StoreError> {
        self.db
            .with(|c| c.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)))
    }

    /// Replace the credential triple after a password change. The new
    /// wrapping and hash land in one statement so a crash cannot leave a
    /// row whose wrapping and hash disagree.
    pub fn update_credentials(
        &self,
        id: &str,
        password_hash: &str,
        kdf_salt: &str,
        wrapped_data_key: &str,
    ) -> Result<(), StoreError> {
        let changed = self.db.with(|c| {
            c.execute(
                "UPDATE users SET password_hash = ?2, kdf_salt = ?3, wrapped_data_key = ?4
                 WHERE id = ?1",
                rusqlite::params![id, password_hash, kdf_salt, wrapped_data_key],
            )
        })?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
