//! API error responses.
//!
//! One response type for every handler. Business failures carry structured
//! bodies; structural failures collapse to a generic 500 whose detail goes
//! to the log, never to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use stockroom_payments::{PaymentError, SignatureError};
use stockroom_reservations::ReservationError;
use stockroom_store::StoreError;
use tracing::{error, warn};

/// A structured API error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    /// Stable machine-readable error tag.
    code: &'static str,
    /// Human-readable message; safe to echo.
    message: String,
    /// Optional structured details (out-of-stock SKUs, field names).
    details: Option<serde_json::Value>,
}

impl ApiError {
    /// 400: malformed input, missing field, unknown SKU, bad origin.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "validation",
            message: message.into(),
            details: None,
        }
    }

    /// 401: login or session rejected. No further detail.
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: "invalid credentials".into(),
            details: None,
        }
    }

    /// 429: rate limited. No further detail.
    pub fn rate_limited() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            code: "rate_limited",
            message: "too many requests".into(),
            details: None,
        }
    }

    /// 409: insufficient stock, with per-SKU details.
    pub fn out_of_stock(details: serde_json::Value) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code: "out_of_stock",
            message: "insufficient stock".into(),
            details: Some(details),
        }
    }

    /// 400: webhook signature rejected, discriminated by sub-reason.
    pub fn signature_invalid(reason: SignatureError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "signature_invalid",
            message: reason.to_string(),
            details: None,
        }
    }

    /// 400: provider not configured (webhook ingress).
    pub fn not_configured() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "not_configured",
            message: "payment provider not configured".into(),
            details: None,
        }
    }

    /// 500: provider failure, generic body.
    pub fn provider_unavailable() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "provider_unavailable",
            message: "payment provider unavailable".into(),
            details: None,
        }
    }

    /// 500: anything else, generic body.
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: "internal error".into(),
            details: None,
        }
    }

    /// The HTTP status this error renders with.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.code, "message": self.message });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::KeyUnavailable => {
                warn!("request needed DATA_KEY before any login recovered it");
                ApiError::not_configured()
            }
            other => {
                error!(error = %other, "store failure");
                ApiError::internal()
            }
        }
    }
}

impl From<ReservationError> for ApiError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::NotFound => ApiError::validation("unknown product"),
            ReservationError::OutOfStock => ApiError::out_of_stock(json!([])),
            ReservationError::InvalidQuantity => ApiError::validation("quantity must be positive"),
            ReservationError::Store(inner) => inner.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::NotConfigured => ApiError::not_configured(),
            PaymentError::Signature(reason) => ApiError::signature_invalid(reason),
            PaymentError::Provider { status, code, kind } => {
                error!(%status, %code, %kind, "provider request failed");
                ApiError::provider_unavailable()
            }
            PaymentError::Network(source) => {
                error!(error = %source, "provider unreachable");
                ApiError::provider_unavailable()
            }
            PaymentError::MalformedResponse => {
                error!("provider response missing required fields");
                ApiError::provider_unavailable()
            }
            PaymentError::Store(inner) => inner.into(),
            PaymentError::Reservation(inner) => inner.into(),
        }
    }
}
