//! # Outbound Order Notification
//!
//! When a completion webhook lands and an outbound URL is configured, the
//! shop POSTs an `order.completed` summary there. Delivery is best-effort:
//! one bounded attempt, failures logged and swallowed: the inbound
//! webhook response never depends on it.

use serde::Serialize;
use shared_types::LineItem;
use std::time::Duration;
use tracing::{debug, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// The `order.completed` payload.
#[derive(Debug, Clone, Serialize)]
pub struct OrderNotification {
    /// Always `"order.completed"`.
    pub event_type: &'static str,
    /// The provider session the order completed under.
    pub provider_session_id: String,
    /// ISO-4217 currency code.
    pub currency: String,
    /// The purchased lines.
    pub line_items: Vec<LineItem>,
    /// ISO-8601 completion instant.
    pub timestamp: String,
}

impl OrderNotification {
    /// Build a notification stamped with the current instant.
    pub fn new(provider_session_id: String, currency: String, line_items: Vec<LineItem>) -> Self {
        Self {
            event_type: "order.completed",
            provider_session_id,
            currency,
            line_items,
            timestamp: stockroom_store::time::now_iso(),
        }
    }
}

/// Fire-and-forget notification sender.
#[derive(Clone, Default)]
pub struct OrderNotifier {
    http: reqwest::Client,
}

impl OrderNotifier {
    /// Create a sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// POST the notification. Never fails the caller; non-2xx and network
    /// errors are logged and dropped. No retries.
    pub async fn send(&self, url: &str, notification: &OrderNotification) {
        let result = self
            .http
            .post(url)
            .timeout(DELIVERY_TIMEOUT)
            .json(notification)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(
                    session_id = %notification.provider_session_id,
                    "order notification delivered"
                );
            }
            Ok(response) => {
                warn!(
                    session_id = %notification.provider_session_id,
                    status = response.status().as_u16(),
                    "order notification rejected"
                );
            }
            Err(e) => {
                warn!(
                    session_id = %notification.provider_session_id,
                    error = %e,
                    "order notification delivery failed"
                );
            }
        }
    }
}
