//! # Stockroom Payments Crate
//!
//! Everything provider-facing:
//!
//! - [`provider`]: the tagged Stripe/Square variant with the common method
//!   surface the rest of the system consumes
//! - [`signature`]: webhook signature schemes (Stripe `t=/v1=`, Square
//!   base64 HMAC), verified constant-time over the raw body
//! - [`webhook`]: the integrator that maps verified events onto
//!   reservation transitions behind the idempotency claim store
//! - [`notify`]: the best-effort outbound `order.completed` POST
//!
//! The integrator never parses provider JSON itself; payload shapes stay
//! behind the provider's method surface.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cache;
pub mod errors;
pub mod notify;
pub mod provider;
pub mod signature;
pub mod square;
pub mod stripe;
pub mod webhook;

pub use cache::ProviderCache;
pub use errors::{PaymentError, SignatureError};
pub use notify::{OrderNotification, OrderNotifier};
pub use provider::{
    resolve_provider, CheckoutRequest, CheckoutSession, PaymentProvider, WebhookEvent,
};
pub use square::SquareProvider;
pub use stripe::StripeProvider;
pub use webhook::{WebhookOutcome, WebhookProcessor};
