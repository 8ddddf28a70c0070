//! Provider-client cache: at most one constructed client per provider
//! variant. Rebuilding a provider re-reads settings and re-decrypts
//! credentials, so the hot webhook/checkout paths keep the last one.

use crate::PaymentProvider;
use parking_lot::RwLock;
use std::sync::Arc;

/// Single-slot cache keyed by provider name.
#[derive(Default)]
pub struct ProviderCache {
    slot: RwLock<Option<Arc<PaymentProvider>>>,
}

impl ProviderCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached provider, if it matches the currently-selected name.
    pub fn get(&self, name: &str) -> Option<Arc<PaymentProvider>> {
        self.slot
            .read()
            .as_ref()
            .filter(|p| p.name() == name)
            .cloned()
    }

    /// Cache a freshly built provider, evicting any previous variant.
    pub fn put(&self, provider: Arc<PaymentProvider>) {
        *self.slot.write() = Some(provider);
    }

    /// Drop the cached client (credentials or selection changed).
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}
