//! Reservation engine error types.

use stockroom_store::StoreError;
use thiserror::Error;

/// Errors from reservation operations.
///
/// `OutOfStock` is an expected business outcome, not a fault; callers
/// translate it to a structured 409 and nothing logs at error level.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Unknown or inactive product
    #[error("product not found or inactive")]
    NotFound,

    /// Available stock is below the requested quantity
    #[error("insufficient stock")]
    OutOfStock,

    /// Requested quantity was zero or negative
    #[error("quantity must be positive")]
    InvalidQuantity,

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for ReservationError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(StoreError::Database(e))
    }
}
