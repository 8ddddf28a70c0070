//! # Webhook Integrator
//!
//! Maps verified provider events onto reservation transitions:
//!
//! - completion → claim the session id, `confirm`, notify
//! - expiry → `expire` (no claim; expiry is idempotent by itself)
//! - refund → resolve the session id, `restock_from_refund`
//! - anything else → acknowledge without side effects
//!
//! The claim plus the status-guarded transition form a two-phase lock:
//! a crashed handler leaves a claim that goes stale and is reclaimed, and
//! the re-run is safe because the transition is idempotent on status.

use crate::errors::{PaymentError, SignatureError};
use crate::notify::{OrderNotification, OrderNotifier};
use crate::provider::{PaymentProvider, WebhookEvent};
use shared_types::LineItem;
use stockroom_reservations::ReservationEngine;
use stockroom_store::{setting_keys, ClaimOutcome, ClaimStore, ProductStore, SettingsStore};
use tracing::{debug, info, warn};

/// What an inbound webhook did. The gateway serialises this to the JSON
/// acknowledgement body.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Completion processed; `confirmed` pending reservations moved.
    Processed {
        /// Rows moved to `confirmed`.
        confirmed: usize,
    },
    /// A previous delivery already claimed this session.
    AlreadyProcessed,
    /// Checkout expiry processed.
    Expired {
        /// Rows moved to `expired`.
        expired: usize,
    },
    /// Refund processed; units returned to stock.
    Restocked {
        /// Rows moved from `confirmed` to `expired`.
        restocked: usize,
    },
    /// Event acknowledged without side effects.
    Received,
}

/// The integrator. Holds everything a webhook needs except the provider,
/// which the caller resolves per request (it can change at runtime).
#[derive(Clone)]
pub struct WebhookProcessor {
    engine: ReservationEngine,
    claims: ClaimStore,
    products: ProductStore,
    settings: SettingsStore,
    notifier: OrderNotifier,
}

impl WebhookProcessor {
    /// Wire up a processor.
    pub fn new(
        engine: ReservationEngine,
        claims: ClaimStore,
        products: ProductStore,
        settings: SettingsStore,
        notifier: OrderNotifier,
    ) -> Self {
        Self {
            engine,
            claims,
            products,
            settings,
            notifier,
        }
    }

    /// Process one inbound webhook: verify, dispatch, transition.
    ///
    /// # Errors
    ///
    /// `PaymentError::Signature` for every rejection class of §signature;
    /// store and reservation faults propagate for the gateway's 500.
    pub async fn process(
        &self,
        provider: &PaymentProvider,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, PaymentError> {
        let header = signature_header.ok_or(SignatureError::MissingHeader)?;
        let event = provider.verify_webhook_signature(body, header)?;

        if event.event_type == provider.checkout_completed_event_type() {
            return self.handle_completion(provider, &event).await;
        }
        if Some(event.event_type.as_str()) == provider.checkout_expired_event_type() {
            return self.handle_expiry(provider, &event);
        }
        if Some(event.event_type.as_str()) == provider.refund_event_type() {
            return self.handle_refund(provider, &event).await;
        }

        debug!(event_type = %event.event_type, "unrecognised webhook event acknowledged");
        Ok(WebhookOutcome::Received)
    }

    async fn handle_completion(
        &self,
        provider: &PaymentProvider,
        event: &WebhookEvent,
    ) -> Result<WebhookOutcome, PaymentError> {
        let Some(session_id) = provider.session_id_from_event(event) else {
            debug!("completion event without actionable session id");
            return Ok(WebhookOutcome::Received);
        };

        match self.claims.claim(&session_id)? {
            ClaimOutcome::AlreadyClaimed(_) => {
                debug!(%session_id, "completion replayed; acknowledging idempotently");
                Ok(WebhookOutcome::AlreadyProcessed)
            }
            ClaimOutcome::Claimed => {
                let confirmed = self.engine.confirm(&session_id)?;
                info!(%session_id, confirmed, "checkout completed");
                self.notify_completion(&session_id).await;
                Ok(WebhookOutcome::Processed { confirmed })
            }
        }
    }

    fn handle_expiry(
        &self,
        provider: &PaymentProvider,
        event: &WebhookEvent,
    ) -> Result<WebhookOutcome, PaymentError> {
        let Some(session_id) = provider.session_id_from_event(event) else {
            return Ok(WebhookOutcome::Received);
        };
        let expired = self.engine.expire(&session_id)?;
        info!(%session_id, expired, "checkout expired; stock released");
        Ok(WebhookOutcome::Expired { expired })
    }

    async fn handle_refund(
        &self,
        provider: &PaymentProvider,
        event: &WebhookEvent,
    ) -> Result<WebhookOutcome, PaymentError> {
        let Some(session_id) = provider.get_refund_reference(event).await? else {
            debug!("refund event did not resolve to a session");
            return Ok(WebhookOutcome::Received);
        };
        let restocked = self.engine.restock_from_refund(&session_id)?;
        info!(%session_id, restocked, "refund processed; stock returned");
        Ok(WebhookOutcome::Restocked { restocked })
    }

    /// Build and send the outbound order notification, if configured.
    /// Failures here never surface to the inbound webhook response.
    async fn notify_completion(&self, session_id: &str) {
        let url = match self.settings.get(setting_keys::WEBHOOK_URL) {
            Ok(Some(url)) if !url.is_empty() => url,
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "could not read outbound webhook url");
                return;
            }
        };

        let line_items = match self.order_line_items(session_id) {
            Ok(items) => items,
            Err(e) => {
                warn!(%session_id, error = %e, "could not assemble order notification");
                return;
            }
        };
        let currency = self
            .settings
            .get(setting_keys::CURRENCY_CODE)
            .ok()
            .flatten()
            .unwrap_or_else(|| "USD".to_string());

        let notification =
            OrderNotification::new(session_id.to_string(), currency, line_items);
        self.notifier.send(&url, &notification).await;
    }

    fn order_line_items(&self, session_id: &str) -> Result<Vec<LineItem>, PaymentError> {
        let reservations = self.engine.list_by_session(session_id)?;
        let mut items = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            let Some(product) = self.products.get(&reservation.product_id)? else {
                continue;
            };
            items.push(LineItem {
                sku: product.sku,
                name: product.name,
                unit_price: product.unit_price,
                quantity: reservation.quantity,
            });
        }
        Ok(items)
    }
}
