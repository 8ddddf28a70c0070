//! `POST /payment/webhook`: provider ingress.
//!
//! The raw body is taken bit-exact before any parsing; signature
//! verification sees the same bytes the provider signed.

use crate::{ApiError, AppState};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use stockroom_payments::WebhookOutcome;

/// Handle one provider webhook delivery.
pub async fn ingress(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let provider = state.active_provider()?;

    let signature = headers
        .get(provider.signature_header())
        .and_then(|h| h.to_str().ok());

    let outcome = state
        .processor
        .process(&provider, signature, &body)
        .await?;

    let body = match outcome {
        WebhookOutcome::Processed { confirmed } => {
            json!({ "processed": true, "confirmed": confirmed })
        }
        WebhookOutcome::AlreadyProcessed => json!({ "already_processed": true }),
        WebhookOutcome::Expired { expired } => json!({ "processed": true, "expired": expired }),
        WebhookOutcome::Restocked { restocked } => json!({ "restocked": restocked }),
        WebhookOutcome::Received => json!({ "received": true }),
    };
    Ok(Json(body))
}
