//! # Stripe Provider
//!
//! Hosted Checkout Sessions over the form-encoded v1 API. Webhooks are
//! signed with the `t=/v1=` scheme over `t || "." || body`.

use crate::errors::{PaymentError, SignatureError};
use crate::provider::{CheckoutRequest, CheckoutSession, WebhookEvent};
use crate::signature::{verify_timestamped_signature, DEFAULT_TOLERANCE_SECS};
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api.stripe.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe credentials and API client.
pub struct StripeProvider {
    secret_key: String,
    webhook_secret: String,
    /// Webhook endpoint id (`we_…`), kept for admin-side reconciliation.
    pub endpoint_id: Option<String>,
    api_base: String,
    http: reqwest::Client,
}

impl StripeProvider {
    /// Stripe's signature header.
    pub const SIGNATURE_HEADER: &'static str = "stripe-signature";
    /// Completed checkout event.
    pub const COMPLETED_EVENT: &'static str = "checkout.session.completed";
    /// Expired checkout event.
    pub const EXPIRED_EVENT: &'static str = "checkout.session.expired";
    /// Refund event.
    pub const REFUND_EVENT: &'static str = "charge.refunded";

    /// Create a provider from credentials.
    pub fn new(secret_key: String, webhook_secret: String, endpoint_id: Option<String>) -> Self {
        Self {
            secret_key,
            webhook_secret,
            endpoint_id,
            api_base: API_BASE.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Point API calls somewhere other than production (stripe-mock,
    /// proxies).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Create a Checkout Session and return its id and redirect URL.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let currency = request.currency.to_lowercase();
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
        ];
        for (i, item) in request.line_items.iter().enumerate() {
            form.push((format!("line_items[{i}][price_data][currency]"), currency.clone()));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                item.unit_price.to_string(),
            ));
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
            form.push((format!("metadata[sku_{i}]"), item.sku.clone()));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .timeout(REQUEST_TIMEOUT)
            .form(&form)
            .send()
            .await?;

        let body = sanitize_response(response).await?;
        let session_id = body["id"].as_str().ok_or(PaymentError::MalformedResponse)?;
        let checkout_url = body["url"].as_str().ok_or(PaymentError::MalformedResponse)?;
        Ok(CheckoutSession {
            session_id: session_id.to_string(),
            checkout_url: checkout_url.to_string(),
        })
    }

    /// Verify the `t=/v1=` signature, then parse the event.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        header: &str,
    ) -> Result<WebhookEvent, SignatureError> {
        verify_timestamped_signature(
            self.webhook_secret.as_bytes(),
            header,
            payload,
            DEFAULT_TOLERANCE_SECS,
            chrono::Utc::now().timestamp(),
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

    /// Session id for `checkout.session.*` events.
    pub fn session_id_from_event(&self, event: &WebhookEvent) -> Option<String> {
        event.payload["data"]["object"]["id"]
            .as_str()
            .map(str::to_string)
    }

    /// Resolve a `charge.refunded` event to its checkout session: the
    /// charge names a payment intent, which the sessions list API maps
    /// back to the session that created it.
    pub async fn get_refund_reference(
        &self,
        event: &WebhookEvent,
    ) -> Result<Option<String>, PaymentError> {
        let Some(payment_intent) = event.payload["data"]["object"]["payment_intent"].as_str()
        else {
            debug!("refund event carried no payment intent");
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .timeout(REQUEST_TIMEOUT)
            .query(&[("payment_intent", payment_intent), ("limit", "1")])
            .send()
            .await?;

        let body = sanitize_response(response).await?;
        Ok(body["data"][0]["id"].as_str().map(str::to_string))
    }
}

/// Decode a Stripe response, reducing failures to the sanitised
/// `status/code/type` triple. Raw provider messages never leave here.
async fn sanitize_response(response: reqwest::Response) -> Result<serde_json::Value, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    Err(PaymentError::Provider {
        status: status.as_u16().to_string(),
        code: body["error"]["code"].as_str().unwrap_or("-").to_string(),
        kind: body["error"]["type"].as_str().unwrap_or("-").to_string(),
    })
}
