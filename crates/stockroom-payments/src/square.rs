//! # Square Provider
//!
//! Payment links over the v2 API. Square signs webhooks with
//! `base64(HMAC(signature_key, notification_url || body))` and carries no
//! timestamp scheme; the notification URL binding takes its place.

use crate::errors::{PaymentError, SignatureError};
use crate::provider::{CheckoutRequest, CheckoutSession, WebhookEvent};
use crate::signature::verify_url_keyed_signature;
use std::time::Duration;
use uuid::Uuid;

const API_BASE: &str = "https://connect.squareup.com";
const API_VERSION: &str = "2024-01-18";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Square credentials and API client.
pub struct SquareProvider {
    access_token: String,
    location_id: String,
    webhook_signature_key: String,
    /// This deployment's webhook ingress URL; part of the signed payload.
    notification_url: String,
    api_base: String,
    http: reqwest::Client,
}

impl SquareProvider {
    /// Square's signature header.
    pub const SIGNATURE_HEADER: &'static str = "x-square-hmacsha256-signature";
    /// Completed payment event. The payment object must also report
    /// `COMPLETED` status; earlier updates are acknowledged without action.
    pub const COMPLETED_EVENT: &'static str = "payment.updated";
    /// Refund event.
    pub const REFUND_EVENT: &'static str = "refund.updated";

    /// Create a provider from credentials.
    pub fn new(
        access_token: String,
        location_id: String,
        webhook_signature_key: String,
        notification_url: String,
    ) -> Self {
        Self {
            access_token,
            location_id,
            webhook_signature_key,
            notification_url,
            api_base: API_BASE.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Point API calls somewhere other than production (the Square
    /// sandbox host, proxies).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Create a payment link; the underlying order id doubles as the
    /// provider session id.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let currency = request.currency.to_uppercase();
        let line_items: Vec<serde_json::Value> = request
            .line_items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "name": item.name,
                    "quantity": item.quantity.to_string(),
                    "note": item.sku,
                    "base_price_money": {
                        "amount": item.unit_price,
                        "currency": currency,
                    },
                })
            })
            .collect();

        let body = serde_json::json!({
            "idempotency_key": Uuid::new_v4().to_string(),
            "order": {
                "location_id": self.location_id,
                "line_items": line_items,
            },
            "checkout_options": {
                "redirect_url": request.success_url,
            },
        });

        let response = self
            .http
            .post(format!("{}/v2/online-checkout/payment-links", self.api_base))
            .bearer_auth(&self.access_token)
            .header("Square-Version", API_VERSION)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let body = sanitize_response(response).await?;
        let order_id = body["payment_link"]["order_id"]
            .as_str()
            .ok_or(PaymentError::MalformedResponse)?;
        let checkout_url = body["payment_link"]["url"]
            .as_str()
            .ok_or(PaymentError::MalformedResponse)?;
        Ok(CheckoutSession {
            session_id: order_id.to_string(),
            checkout_url: checkout_url.to_string(),
        })
    }

    /// Verify the URL-keyed signature, then parse the event.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        header: &str,
    ) -> Result<WebhookEvent, SignatureError> {
        verify_url_keyed_signature(
            self.webhook_signature_key.as_bytes(),
            &self.notification_url,
            header,
            payload,
        )?;

        let parsed: serde_json::Value =
            serde_json::from_slice(payload).map_err(|_| SignatureError::InvalidPayload)?;
        let event_type = parsed["type"]
            .as_str()
            .ok_or(SignatureError::InvalidPayload)?
            .to_string();
        Ok(WebhookEvent {
            event_type,
            payload: parsed,
        })
    }

    /// Order id for a `payment.updated` event, only once the payment has
    /// reached `COMPLETED`.
    pub fn session_id_from_event(&self, event: &WebhookEvent) -> Option<String> {
        let payment = &event.payload["data"]["object"]["payment"];
        if payment["status"].as_str() != Some("COMPLETED") {
            return None;
        }
        payment["order_id"].as_str().map(str::to_string)
    }

    /// Order id for a `refund.updated` event. The refund object names its
    /// order directly; no secondary lookup is needed, but a payload
    /// missing it falls back to resolving the payment.
    pub async fn get_refund_reference(
        &self,
        event: &WebhookEvent,
    ) -> Result<Option<String>, PaymentError> {
        let refund = &event.payload["data"]["object"]["refund"];
        if refund["status"].as_str() != Some("COMPLETED") {
            return Ok(None);
        }
        if let Some(order_id) = refund["order_id"].as_str() {
            return Ok(Some(order_id.to_string()));
        }

        let Some(payment_id) = refund["payment_id"].as_str() else {
            return Ok(None);
        };
        let response = self
            .http
            .get(format!("{}/v2/payments/{payment_id}", self.api_base))
            .bearer_auth(&self.access_token)
            .header("Square-Version", API_VERSION)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let body = sanitize_response(response).await?;
        Ok(body["payment"]["order_id"].as_str().map(str::to_string))
    }
}

/// Decode a Square response, reducing failures to the sanitised
/// `status/code/type` triple.
async fn sanitize_response(response: reqwest::Response) -> Result<serde_json::Value, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    Err(PaymentError::Provider {
        status: status.as_u16().to_string(),
        code: body["errors"][0]["code"].as_str().unwrap_or("-").to_string(),
        kind: body["errors"][0]["category"].as_str().unwrap_or("-").to_string(),
    })
}
