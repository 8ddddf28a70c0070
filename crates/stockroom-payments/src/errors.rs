//! Payment layer error types.
//!
//! Provider SDK failures are reduced to a `status/code/type` triple before
//! they can reach a log line; raw provider messages may carry keys or PII
//! and never leave this crate.

use stockroom_reservations::ReservationError;
use stockroom_store::StoreError;
use thiserror::Error;

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The provider's signature header is absent
    #[error("signature header missing")]
    MissingHeader,

    /// The header does not parse into its expected form
    #[error("signature header malformed")]
    MalformedHeader,

    /// The signed timestamp is outside the accepted window
    #[error("signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    /// No candidate signature matched the computed MAC
    #[error("signature mismatch")]
    Mismatch,

    /// The MAC verified but the body is not valid JSON
    #[error("payload is not valid JSON")]
    InvalidPayload,
}

/// Errors from provider calls and webhook processing.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No provider is configured, or its credentials are missing
    #[error("payment provider not configured")]
    NotConfigured,

    /// Webhook signature verification failed
    #[error("webhook rejected: {0}")]
    Signature(#[from] SignatureError),

    /// The provider API refused the request. Only sanitised fields.
    #[error("provider request failed: status={status} code={code} type={kind}")]
    Provider {
        /// HTTP status, as reported
        status: String,
        /// Provider error code field
        code: String,
        /// Provider error type/category field
        kind: String,
    },

    /// The provider API could not be reached
    #[error("provider network failure")]
    Network(#[source] reqwest::Error),

    /// The provider responded 2xx but the body lacked required fields
    #[error("provider response malformed")]
    MalformedResponse,

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Underlying reservation failure
    #[error(transparent)]
    Reservation(#[from] ReservationError),
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e)
    }
}
