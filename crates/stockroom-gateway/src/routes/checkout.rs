//! `POST /api/checkout`: validate, rate-limit, create the provider
//! session, reserve stock.
//!
//! The availability pre-check gives fast, detailed 409s; the authoritative
//! check is the reservation batch itself, which runs after the provider
//! session exists (reservations are keyed by its id). Losing the race
//! between the two abandons the provider session, which expires on the
//! provider's side.

use crate::client_ip::client_ip;
use crate::{ApiError, AppState};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_types::{CartItem, LineItem, Product, UNLIMITED_STOCK};
use std::net::SocketAddr;
use stockroom_payments::CheckoutRequest;
use stockroom_reservations::{BatchItem, BatchOutcome};
use stockroom_store::setting_keys;
use tracing::debug;

const MAX_CART_LINES: usize = 50;

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Requested items.
    pub items: Vec<CartItem>,
    /// Redirect after successful payment.
    pub success_url: String,
    /// Redirect after abandonment.
    pub cancel_url: String,
}

/// Checkout success response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// The provider session id.
    pub session_id: String,
    /// Where to send the buyer.
    pub checkout_url: String,
}

/// Handle a checkout.
pub async fn create(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    validate(&body)?;

    let ip = client_ip(&headers, connect_info.as_ref());
    if state.checkout_limiter.is_rate_limited(&ip)? {
        return Err(ApiError::rate_limited());
    }
    if state.checkout_limiter.record_attempt(&ip)? {
        debug!(ip_scope = "checkout", "lockout engaged");
        return Err(ApiError::rate_limited());
    }

    // Resolve SKUs and pre-check availability for detailed 409s.
    let mut resolved: Vec<(Product, i64)> = Vec::with_capacity(body.items.len());
    let mut shortages = Vec::new();
    for item in &body.items {
        let product = state
            .products
            .get_by_sku(&item.sku)?
            .filter(|p| p.active)
            .ok_or_else(|| ApiError::validation(format!("unknown sku: {}", item.sku)))?;
        let available = state.engine.available(&product)?;
        if available != UNLIMITED_STOCK && available < item.quantity {
            shortages.push(json!({
                "sku": item.sku,
                "requested": item.quantity,
                "available": available,
            }));
        }
        resolved.push((product, item.quantity));
    }
    if !shortages.is_empty() {
        return Err(ApiError::out_of_stock(json!(shortages)));
    }

    // Create the provider session first; its id keys the reservations.
    let provider = state.active_provider()?;
    let currency = state
        .settings
        .get(setting_keys::CURRENCY_CODE)?
        .unwrap_or_else(|| "USD".to_string());
    let line_items: Vec<LineItem> = resolved
        .iter()
        .map(|(product, quantity)| LineItem {
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity: *quantity,
        })
        .collect();
    let session = provider
        .create_checkout_session(&CheckoutRequest {
            line_items,
            currency,
            success_url: body.success_url,
            cancel_url: body.cancel_url,
        })
        .await?;

    // The authoritative, transactional reservation.
    let batch: Vec<BatchItem> = resolved
        .iter()
        .map(|(product, quantity)| BatchItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            quantity: *quantity,
        })
        .collect();
    match state.engine.reserve_batch(&batch, &session.session_id)? {
        BatchOutcome::Reserved(_) => Ok(Json(CheckoutResponse {
            session_id: session.session_id,
            checkout_url: session.checkout_url,
        })),
        BatchOutcome::Failed { sku } => {
            // A concurrent buyer won between pre-check and reserve.
            let available = resolved
                .iter()
                .find(|(p, _)| p.sku == sku)
                .map(|(p, _)| state.engine.available(p))
                .transpose()?
                .unwrap_or(0);
            let requested = resolved
                .iter()
                .find(|(p, _)| p.sku == sku)
                .map(|(_, q)| *q)
                .unwrap_or(0);
            Err(ApiError::out_of_stock(json!([{
                "sku": sku,
                "requested": requested,
                "available": available,
            }])))
        }
    }
}

fn validate(body: &CheckoutBody) -> Result<(), ApiError> {
    if body.items.is_empty() {
        return Err(ApiError::validation("items must not be empty"));
    }
    if body.items.len() > MAX_CART_LINES {
        return Err(ApiError::validation("too many cart lines"));
    }
    for item in &body.items {
        if item.sku.trim().is_empty() {
            return Err(ApiError::validation("sku must not be empty"));
        }
        if item.quantity <= 0 {
            return Err(ApiError::validation(format!(
                "quantity for {} must be positive",
                item.sku
            )));
        }
    }
    for (field, url) in [
        ("success_url", &body.success_url),
        ("cancel_url", &body.cancel_url),
    ] {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ApiError::validation(format!("{field} must be an http(s) URL")));
        }
    }
    Ok(())
}
