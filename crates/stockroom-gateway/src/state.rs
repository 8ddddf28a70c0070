//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::GatewayConfig;
use shared_crypto::{DataKey, KeyCache};
use std::sync::Arc;
use stockroom_payments::{
    resolve_provider, OrderNotifier, PaymentError, PaymentProvider, ProviderCache,
    WebhookProcessor,
};
use stockroom_reservations::ReservationEngine;
use stockroom_store::{
    setting_keys, ClaimStore, Database, ProductStore, RateLimitPolicy, RateLimiter, SessionStore,
    SettingsStore, StoreError, UserStore,
};

/// Everything a handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration.
    pub config: GatewayConfig,
    /// Product rows.
    pub products: ProductStore,
    /// The reservation engine.
    pub engine: ReservationEngine,
    /// Settings (encrypted subset included).
    pub settings: SettingsStore,
    /// The process DATA_KEY cache.
    pub keys: Arc<KeyCache>,
    /// Login, session, and password flows.
    pub auth: AuthService,
    /// The webhook integrator.
    pub processor: WebhookProcessor,
    /// One constructed provider client per variant.
    pub provider_cache: Arc<ProviderCache>,
    /// Per-IP limiter for `/api/checkout`.
    pub checkout_limiter: RateLimiter,
    /// Per-IP limiter for `/api/auth/login`.
    pub login_limiter: RateLimiter,
}

impl AppState {
    /// Wire the full state graph over one database.
    ///
    /// `root_key` is the 32-byte environment key: IP and username HMAC
    /// hashing plus bootstrap, never part of the password key hierarchy.
    pub fn build(
        db: Database,
        config: GatewayConfig,
        root_key: DataKey,
    ) -> Result<Self, StoreError> {
        let keys = Arc::new(KeyCache::new());
        let root_key = Arc::new(root_key);

        let products = ProductStore::new(db.clone());
        let engine = ReservationEngine::new(db.clone());
        let settings = SettingsStore::new(db.clone(), Arc::clone(&keys));
        let claims = ClaimStore::new(db.clone());
        let sessions = SessionStore::new(db.clone());
        let users = UserStore::new(db.clone());

        let auth = AuthService::new(
            users,
            sessions,
            settings.clone(),
            Arc::clone(&keys),
            Arc::clone(&root_key),
            config.session_ttl_hours,
        );
        let processor = WebhookProcessor::new(
            engine.clone(),
            claims,
            products.clone(),
            settings.clone(),
            OrderNotifier::new(),
        );

        let checkout_limiter = RateLimiter::new(
            db.clone(),
            root_key.as_bytes(),
            "checkout",
            RateLimitPolicy::checkout(),
        )?;
        let login_limiter = RateLimiter::new(
            db,
            root_key.as_bytes(),
            "login",
            RateLimitPolicy::login(),
        )?;

        Ok(Self {
            config,
            products,
            engine,
            settings,
            keys,
            auth,
            processor,
            provider_cache: Arc::new(ProviderCache::new()),
            checkout_limiter,
            login_limiter,
        })
    }

    /// The active provider, from the cache or rebuilt from settings.
    ///
    /// # Errors
    ///
    /// `PaymentError::NotConfigured` when no provider is selected or its
    /// credentials are absent.
    pub fn active_provider(&self) -> Result<Arc<PaymentProvider>, PaymentError> {
        let name = self
            .settings
            .get(setting_keys::PAYMENT_PROVIDER)?
            .ok_or(PaymentError::NotConfigured)?;

        if let Some(provider) = self.provider_cache.get(&name) {
            return Ok(provider);
        }
        let provider = Arc::new(resolve_provider(
            &self.settings,
            &self.config.notification_url(),
        )?);
        self.provider_cache.put(Arc::clone(&provider));
        Ok(provider)
    }
}
