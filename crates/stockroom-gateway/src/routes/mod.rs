//! Route table and router construction.

pub mod auth;
pub mod checkout;
pub mod products;
pub mod webhook;

use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use stockroom_store::setting_keys;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Build the public router.
///
/// CORS origins come from the `allowed_origins` setting (comma-separated),
/// read once at construction; a restart picks up changes.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/api/products", get(products::list))
        .route("/api/checkout", post(checkout::create))
        .route("/payment/webhook", post(webhook::ingress))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/password", post(auth::change_password))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins = match state.settings.get(setting_keys::ALLOWED_ORIGINS) {
        Ok(Some(list)) => list
            .split(',')
            .filter_map(|origin| {
                let origin = origin.trim();
                match HeaderValue::from_str(origin) {
                    Ok(value) if !origin.is_empty() => Some(value),
                    _ => {
                        warn!(origin, "ignoring unparsable allowed origin");
                        None
                    }
                }
            })
            .collect::<Vec<_>>(),
        _ => Vec::new(),
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}
