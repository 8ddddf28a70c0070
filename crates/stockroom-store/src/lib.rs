//! # Stockroom Store Crate
//!
//! The single relational store shared by every subsystem.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     stockroom-store                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  products   settings   sessions   users                  │
//! │  rate_limit (per-scope tables)    claims (idempotency)   │
//! ├──────────────────────────────────────────────────────────┤
//! │  Database: one SQLite writer connection behind a mutex   │
//! │  migrations: forward-only, latest_db_update marker       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All mutual exclusion is either a single SQL statement or an explicit
//! transaction wrapping a read-then-write pair; there are no application
//! level locks beyond the connection mutex itself.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod claims;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod products;
pub mod rate_limit;
pub mod sessions;
pub mod settings;
pub mod time;
pub mod users;

pub use claims::{ClaimOutcome, ClaimStore};
pub use db::Database;
pub use errors::StoreError;
pub use products::{NewProduct, ProductStore, ProductUpdate};
pub use rate_limit::{RateLimitPolicy, RateLimiter};
pub use sessions::SessionStore;
pub use settings::{setting_keys, SettingsStore};
pub use users::UserStore;
