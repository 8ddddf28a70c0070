//! # Provider Abstraction
//!
//! Payment providers are a tagged variant with a fixed method table. The
//! webhook integrator and the checkout endpoint consume only this surface;
//! provider payload shapes never escape the variant arms.

use crate::errors::{PaymentError, SignatureError};
use crate::square::SquareProvider;
use crate::stripe::StripeProvider;
use shared_types::LineItem;
use stockroom_store::{setting_keys, SettingsStore};

/// What the checkout endpoint asks a provider to create.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Priced cart lines.
    pub line_items: Vec<LineItem>,
    /// ISO-4217 currency code, lowercase accepted.
    pub currency: String,
    /// Where the provider redirects after payment.
    pub success_url: String,
    /// Where the provider redirects on abandonment.
    pub cancel_url: String,
}

/// A created hosted-checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// The provider session id; the reservation and claim key.
    pub session_id: String,
    /// URL the buyer is redirected to.
    pub checkout_url: String,
}

/// A signature-verified, JSON-parsed webhook event.
///
/// The payload stays opaque outside this crate; only the provider arms
/// dig into it.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// The provider's event type string.
    pub event_type: String,
    /// The parsed body.
    pub payload: serde_json::Value,
}

/// The configured payment provider.
pub enum PaymentProvider {
    /// Stripe hosted Checkout.
    Stripe(StripeProvider),
    /// Square payment links.
    Square(SquareProvider),
}

impl PaymentProvider {
    /// Provider name as stored in the `payment_provider` setting.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stripe(_) => "stripe",
            Self::Square(_) => "square",
        }
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// `PaymentError::Provider` with sanitised fields, `Network`, or
    /// `MalformedResponse`.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        match self {
            Self::Stripe(p) => p.create_checkout_session(request).await,
            Self::Square(p) => p.create_checkout_session(request).await,
        }
    }

    /// Verify a webhook signature over the raw body, then parse it.
    ///
    /// # Errors
    ///
    /// A [`SignatureError`] sub-reason; the body is only parsed after the
    /// MAC passes.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        header: &str,
    ) -> Result<WebhookEvent, SignatureError> {
        match self {
            Self::Stripe(p) => p.verify_webhook_signature(payload, header),
            Self::Square(p) => p.verify_webhook_signature(payload, header),
        }
    }

    /// Name of the provider's signature header.
    pub fn signature_header(&self) -> &'static str {
        match self {
            Self::Stripe(_) => StripeProvider::SIGNATURE_HEADER,
            Self::Square(_) => SquareProvider::SIGNATURE_HEADER,
        }
    }

    /// Event type announcing a completed checkout.
    pub fn checkout_completed_event_type(&self) -> &'static str {
        match self {
            Self::Stripe(_) => StripeProvider::COMPLETED_EVENT,
            Self::Square(_) => SquareProvider::COMPLETED_EVENT,
        }
    }

    /// Event type announcing an expired checkout, if the provider has one.
    pub fn checkout_expired_event_type(&self) -> Option<&'static str> {
        match self {
            Self::Stripe(_) => Some(StripeProvider::EXPIRED_EVENT),
            Self::Square(_) => None,
        }
    }

    /// Event type announcing a refund, if the provider has one.
    pub fn refund_event_type(&self) -> Option<&'static str> {
        match self {
            Self::Stripe(_) => Some(StripeProvider::REFUND_EVENT),
            Self::Square(_) => Some(SquareProvider::REFUND_EVENT),
        }
    }

    /// Extract the session id from a completed/expired event.
    ///
    /// `None` means the event carries no actionable session (e.g. a Square
    /// payment update that is not yet `COMPLETED`); the integrator then
    /// acknowledges without side effects.
    pub fn session_id_from_event(&self, event: &WebhookEvent) -> Option<String> {
        match self {
            Self::Stripe(p) => p.session_id_from_event(event),
            Self::Square(p) => p.session_id_from_event(event),
        }
    }

    /// Resolve a refund event to the session id it refunds, performing any
    /// secondary provider lookup required.
    ///
    /// # Errors
    ///
    /// As [`PaymentProvider::create_checkout_session`] for the lookup.
    pub async fn get_refund_reference(
        &self,
        event: &WebhookEvent,
    ) -> Result<Option<String>, PaymentError> {
        match self {
            Self::Stripe(p) => p.get_refund_reference(event).await,
            Self::Square(p) => p.get_refund_reference(event).await,
        }
    }
}

/// Build the active provider from the settings store.
///
/// `notification_url` is this deployment's own webhook ingress URL, which
/// Square's signature scheme covers.
///
/// # Errors
///
/// `PaymentError::NotConfigured` when no provider is selected or a
/// required credential is missing; store/crypto failures propagate.
pub fn resolve_provider(
    settings: &SettingsStore,
    notification_url: &str,
) -> Result<PaymentProvider, PaymentError> {
    let name = settings
        .get(setting_keys::PAYMENT_PROVIDER)?
        .ok_or(PaymentError::NotConfigured)?;

    match name.as_str() {
        "stripe" => {
            let secret_key = require(settings, setting_keys::STRIPE_SECRET_KEY)?;
            let webhook_secret = require(settings, setting_keys::STRIPE_WEBHOOK_SECRET)?;
            let endpoint_id = settings.get(setting_keys::STRIPE_WEBHOOK_ENDPOINT_ID)?;
            Ok(PaymentProvider::Stripe(StripeProvider::new(
                secret_key,
                webhook_secret,
                endpoint_id,
            )))
        }
        "square" => {
            let access_token = require(settings, setting_keys::SQUARE_ACCESS_TOKEN)?;
            let location_id = require(settings, setting_keys::SQUARE_LOCATION_ID)?;
            let signature_key = require(settings, setting_keys::SQUARE_WEBHOOK_SIGNATURE_KEY)?;
            Ok(PaymentProvider::Square(SquareProvider::new(
                access_token,
                location_id,
                signature_key,
                notification_url.to_string(),
            )))
        }
        _ => Err(PaymentError::NotConfigured),
    }
}

fn require(settings: &SettingsStore, key: &str) -> Result<String, PaymentError> {
    settings
        .get(key)?
        .filter(|v| !v.is_empty())
        .ok_or(PaymentError::NotConfigured)
}
