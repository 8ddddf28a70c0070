//! # Shared Types Crate
//!
//! This crate contains all domain entities shared across subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Store-Shaped**: Entities mirror their relational rows; no in-memory
//!   pointer graphs. Ownership is transitive through the provider session id.

pub mod entities;

pub use entities::*;
