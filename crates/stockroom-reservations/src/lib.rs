//! # Stockroom Reservations Crate
//!
//! The reservation engine. A reservation is a claim on units of a product
//! against a provider checkout session; the engine guarantees that two
//! concurrent reservers can never jointly exceed available stock.
//!
//! ## Status machine
//!
//! ```text
//!        (create)
//!           ↓
//!        pending ──confirm──→ confirmed ──restock_from_refund──→ expired
//!           │                                           ↑
//!           └─expire / sweep_stale──────────────────────┘
//! ```
//!
//! `expired` is terminal. Every transition is an `UPDATE ... WHERE status`
//! guard, so replays are idempotent and illegal transitions are inert.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod engine;
pub mod errors;

pub use engine::{BatchItem, BatchOutcome, ReservationEngine};
pub use errors::ReservationError;
