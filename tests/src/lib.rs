//! # Stockroom Test Suite
//!
//! Unified test crate for cross-subsystem scenarios.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Fixtures: in-memory deployment, fake provider
//! │                     # API, outbound-webhook capture server
//! └── integration/      # Cross-subsystem choreography
//!     ├── checkout_flow.rs
//!     ├── webhook_flow.rs
//!     └── auth_flow.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p stockroom-tests
//! cargo test -p stockroom-tests integration::checkout_flow
//! ```

pub mod support;

#[cfg(test)]
mod integration;
