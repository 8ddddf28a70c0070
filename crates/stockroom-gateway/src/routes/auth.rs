//! JSON auth endpoints: login, logout, password change.
//!
//! Login is rate-limited per IP on failures and the limiter row clears on
//! success. Failures are uniform `401 invalid credentials` regardless of
//! cause.

use crate::auth::AuthError;
use crate::client_ip::client_ip;
use crate::{ApiError, AppState};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::debug;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginBody {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Login success response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// CSRF token bound to the session.
    pub csrf_token: String,
}

/// Password change request body.
#[derive(Debug, Deserialize)]
pub struct PasswordBody {
    /// The password being replaced.
    pub current_password: String,
    /// The replacement.
    pub new_password: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => ApiError::unauthorized(),
            AuthError::SetupComplete => ApiError::validation("setup already complete"),
            AuthError::Crypto(_) => ApiError::internal(),
            AuthError::Store(inner) => inner.into(),
        }
    }
}

/// Handle a login attempt.
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::validation("username and password are required"));
    }

    let ip = client_ip(&headers, connect_info.as_ref());
    if state.login_limiter.is_rate_limited(&ip)? {
        return Err(ApiError::rate_limited());
    }

    match state.auth.login(&body.username, &body.password) {
        Ok(issued) => {
            state.login_limiter.clear_attempts(&ip)?;
            Ok(Json(LoginResponse {
                token: issued.token,
                csrf_token: issued.csrf_token,
            }))
        }
        Err(AuthError::InvalidCredentials) => {
            let locked = state.login_limiter.record_attempt(&ip)?;
            debug!(locked, "login attempt rejected");
            if locked {
                Err(ApiError::rate_limited())
            } else {
                Err(ApiError::unauthorized())
            }
        }
        Err(other) => Err(other.into()),
    }
}

/// Drop the presented session.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let Some(token) = bearer_token(&headers) else {
        return Err(ApiError::unauthorized());
    };
    state.auth.logout(token)?;
    Ok(Json(json!({ "logged_out": true })))
}

/// Change the password and invalidate every session.
pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PasswordBody>,
) -> Result<Json<Value>, ApiError> {
    let Some(token) = bearer_token(&headers) else {
        return Err(ApiError::unauthorized());
    };
    if body.new_password.len() < 12 {
        return Err(ApiError::validation(
            "new password must be at least 12 characters",
        ));
    }
    state
        .auth
        .change_password(token, &body.current_password, &body.new_password)?;
    Ok(Json(json!({ "password_changed": true })))
}
