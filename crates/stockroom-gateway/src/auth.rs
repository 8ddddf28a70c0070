//! # Authentication Service
//!
//! The user-facing half of the key hierarchy: setup, login, per-request
//! session recovery, and password change. The KEK is derived and dropped
//! inside these functions only; every other path recovers DATA_KEY from
//! the session wrapping or the process key cache.

use chrono::Utc;
use shared_crypto::{
    asymmetric, decrypt_string, derive_kek, derive_session_key, encrypt_value, generate_salt,
    generate_token, hash_password, hmac_sha256_hex, sha256_hex, unwrap_data_key, verify_password,
    wrap_data_key, CryptoError, DataKey, KeyCache, RsaKeyPair,
};
use shared_types::{AdminLevel, Session, User};
use stockroom_store::{setting_keys, SessionStore, SettingsStore, StoreError, UserStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain-separation salt for wrapping DATA_KEY under session tokens.
/// The token itself is 256 bits of OS randomness, so a fixed salt is fine.
const SESSION_WRAP_SALT: &[u8] = b"stockroom.session.wrap.v1";

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user, wrong password, or dead session. Deliberately one
    /// variant: callers must not be able to tell which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Setup has already run
    #[error("setup already complete")]
    SetupComplete,

    /// Keypair or wrapping generation failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A freshly issued login session.
#[derive(Debug)]
pub struct IssuedSession {
    /// The bearer token handed to the client. Never stored.
    pub token: String,
    /// The CSRF token bound to this session.
    pub csrf_token: String,
}

/// The authentication service.
#[derive(Clone)]
pub struct AuthService {
    users: UserStore,
    sessions: SessionStore,
    settings: SettingsStore,
    keys: Arc<KeyCache>,
    /// Process root key (environment): HMAC username indexing only here.
    root_key: Arc<DataKey>,
    session_ttl_hours: i64,
}

impl AuthService {
    /// Wire up the service.
    pub fn new(
        users: UserStore,
        sessions: SessionStore,
        settings: SettingsStore,
        keys: Arc<KeyCache>,
        root_key: Arc<DataKey>,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            users,
            sessions,
            settings,
            keys,
            root_key,
            session_ttl_hours,
        }
    }

    fn username_index(&self, username: &str) -> String {
        hmac_sha256_hex(
            self.root_key.as_bytes(),
            username.trim().to_lowercase().as_bytes(),
        )
    }

    /// One-shot initial setup: generate DATA_KEY and the tenant RSA
    /// keypair, create the single `owner` user, and mark setup complete.
    ///
    /// # Errors
    ///
    /// `AuthError::SetupComplete` if any user exists or the flag is set.
    pub fn initial_setup(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if self.users.count()? > 0
            || self
                .settings
                .get(setting_keys::SETUP_COMPLETE)?
                .as_deref()
                == Some("1")
        {
            return Err(AuthError::SetupComplete);
        }

        let data_key = DataKey::generate();
        // Encrypted-setting writes below read DATA_KEY from the cache.
        self.keys.store(data_key.clone());

        let keypair = RsaKeyPair::generate()?;
        self.settings.set(
            setting_keys::WRAPPED_PRIVATE_KEY,
            &asymmetric::private_key_to_jwk(&keypair.private)?,
        )?;
        self.settings.set(
            setting_keys::PUBLIC_KEY,
            &asymmetric::public_key_to_jwk(&keypair.public)?,
        )?;
        if self.settings.get(setting_keys::CURRENCY_CODE)?.is_none() {
            self.settings.set(setting_keys::CURRENCY_CODE, "USD")?;
        }

        self.create_user(username, password, AdminLevel::Owner, &data_key)?;
        self.settings.set(setting_keys::SETUP_COMPLETE, "1")?;
        info!("initial setup complete");
        Ok(())
    }

    /// Create an additional `manager` user. Requires DATA_KEY recovered
    /// (i.e. an authenticated owner session somewhere in this process).
    pub fn create_manager(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let data_key = self.keys.get().ok_or(StoreError::KeyUnavailable)?;
        self.create_user(username, password, AdminLevel::Manager, &data_key)
    }

    fn create_user(
        &self,
        username: &str,
        password: &str,
        level: AdminLevel,
        data_key: &DataKey,
    ) -> Result<(), AuthError> {
        let kdf_salt = generate_salt();
        let kek = derive_kek(password, &kdf_salt);

        let user = User {
            id: Uuid::new_v4().to_string(),
            username_index: self.username_index(username),
            username_hash: encrypt_value(data_key, username.as_bytes())?,
            password_hash: encrypt_value(data_key, hash_password(password).as_bytes())?,
            kdf_salt: hex::encode(kdf_salt),
            wrapped_data_key: wrap_data_key(data_key, &kek)?,
            admin_level: encrypt_value(data_key, level.as_str().as_bytes())?,
            created: Utc::now(),
        };
        self.users.insert(&user)?;
        Ok(())
    }

    /// Log in: derive the KEK, unwrap DATA_KEY, verify the password hash,
    /// and issue a session carrying a token-derived wrapping of DATA_KEY.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidCredentials` for every authentication failure
    /// shape: unknown user, wrong password, corrupt wrapping.
    pub fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let user = self
            .users
            .find_by_username_index(&self.username_index(username))?
            .ok_or(AuthError::InvalidCredentials)?;

        let kdf_salt = hex::decode(&user.kdf_salt).map_err(|_| AuthError::InvalidCredentials)?;
        let kek = derive_kek(password, &kdf_salt);
        let data_key = unwrap_data_key(&user.wrapped_data_key, &kek)
            .map_err(|_| AuthError::InvalidCredentials)?;

        // The unwrap succeeding already proves the password; the stored
        // hash check guards against a corrupted wrapping accepting noise.
        let stored_hash = decrypt_string(&data_key, &user.password_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;
        if !verify_password(password, &stored_hash).map_err(|_| AuthError::InvalidCredentials)? {
            warn!(user_id = %user.id, "password hash disagreed with key wrapping");
            return Err(AuthError::InvalidCredentials);
        }

        let token = generate_token();
        let session_key = derive_session_key(&token, SESSION_WRAP_SALT);
        let session = Session {
            token_hash: sha256_hex(token.as_bytes()),
            csrf_token: generate_token(),
            expires: Utc::now().timestamp_millis() + self.session_ttl_hours * 3_600_000,
            wrapped_data_key: wrap_data_key(&data_key, &session_key)?,
            user_id: user.id.clone(),
        };
        self.sessions.insert(&session)?;
        self.keys.store(data_key);

        info!(user_id = %user.id, "login succeeded");
        Ok(IssuedSession {
            token,
            csrf_token: session.csrf_token,
        })
    }

    /// Resolve a bearer token to its session, recovering DATA_KEY from the
    /// session wrapping (no KEK involved) and refreshing the key cache.
    pub fn resolve_session(&self, token: &str) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.sessions.get(&sha256_hex(token.as_bytes()))? else {
            return Ok(None);
        };

        let session_key = derive_session_key(token, SESSION_WRAP_SALT);
        match unwrap_data_key(&session.wrapped_data_key, &session_key) {
            Ok(data_key) => self.keys.store(data_key),
            Err(e) => {
                warn!(error = %e, "session wrapping failed to unwrap; dropping session");
                self.sessions.delete(&session.token_hash)?;
                return Ok(None);
            }
        }
        Ok(Some(session))
    }

    /// Drop the presented session.
    pub fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.delete(&sha256_hex(token.as_bytes()))?;
        Ok(())
    }

    /// Remove session rows past their expiry. Returns the count.
    pub fn sweep_sessions(&self) -> Result<usize, AuthError> {
        Ok(self.sessions.sweep_expired()?)
    }

    /// Change the password for the session's user: re-derive the KEK with
    /// a fresh salt, re-wrap DATA_KEY, and invalidate every session.
    /// At-rest ciphertexts are untouched.
    pub fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let session = self
            .resolve_session(token)?
            .ok_or(AuthError::InvalidCredentials)?;
        let user = self
            .users
            .get(&session.user_id)?
            .ok_or(AuthError::InvalidCredentials)?;

        // The current password must still unwrap the user's wrapping.
        let kdf_salt = hex::decode(&user.kdf_salt).map_err(|_| AuthError::InvalidCredentials)?;
        let kek = derive_kek(current_password, &kdf_salt);
        let data_key = unwrap_data_key(&user.wrapped_data_key, &kek)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let new_salt = generate_salt();
        let new_kek = derive_kek(new_password, &new_salt);
        self.users.update_credentials(
            &user.id,
            &encrypt_value(&data_key, hash_password(new_password).as_bytes())?,
            &hex::encode(new_salt),
            &wrap_data_key(&data_key, &new_kek)?,
        )?;

        let dropped = self.sessions.delete_all()?;
        info!(user_id = %user.id, dropped, "password changed; all sessions invalidated");
        Ok(())
    }
}
