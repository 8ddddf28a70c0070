//! # Stockroom Gateway Crate
//!
//! The public HTTP surface.
//!
//! ## Routes
//!
//! ```text
//! GET  /api/products        active products with available stock
//! POST /api/checkout        validate → rate-limit → provider session → reserve
//! POST /payment/webhook     signature-verified provider ingress
//! POST /api/auth/login      key-hierarchy login, issues a session token
//! POST /api/auth/logout     drops the presented session
//! POST /api/auth/password   re-wraps DATA_KEY, invalidates all sessions
//! ```
//!
//! Handlers recover business failures into structured responses; anything
//! structural falls through to a generic 500 with the detail logged, never
//! echoed.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod auth;
pub mod client_ip;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use auth::AuthService;
pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
