//! Test fixtures: a full in-memory deployment, a fake provider API, and a
//! capture server for outbound order notifications.

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_crypto::{hmac_sha256, DataKey};
use shared_types::Product;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stockroom_gateway::{router, AppState, GatewayConfig};
use stockroom_payments::{PaymentProvider, SquareProvider};
use stockroom_store::{migrations, setting_keys, Database, NewProduct};
use tower::ServiceExt;

/// The Square webhook signature key every fixture uses.
pub const SIGNATURE_KEY: &[u8] = b"test-square-signature-key";

/// A fake provider API plus notification capture target.
#[derive(Clone)]
pub struct FakeProvider {
    /// Base URL of the fake API server.
    pub base_url: String,
    counter: Arc<AtomicUsize>,
    notifications: Arc<Mutex<Vec<Value>>>,
}

impl FakeProvider {
    /// Order ids handed out so far.
    pub fn sessions_created(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Captured outbound order notifications.
    pub fn notifications(&self) -> Vec<Value> {
        self.notifications.lock().clone()
    }
}

#[derive(Clone, Default)]
struct FakeState {
    counter: Arc<AtomicUsize>,
    notifications: Arc<Mutex<Vec<Value>>>,
}

async fn create_payment_link(State(state): State<FakeState>) -> Json<Value> {
    let n = state.counter.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "payment_link": {
            "order_id": format!("ord_{n}"),
            "url": format!("https://pay.example/{n}"),
        }
    }))
}

async fn capture_notification(
    State(state): State<FakeState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.notifications.lock().push(body);
    Json(json!({ "received": true }))
}

/// Spawn the fake provider on an ephemeral port.
pub async fn spawn_fake_provider() -> FakeProvider {
    let state = FakeState::default();
    let app = Router::new()
        .route("/v2/online-checkout/payment-links", post(create_payment_link))
        .route("/notify", post(capture_notification))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeProvider {
        base_url: format!("http://{addr}"),
        counter: state.counter,
        notifications: state.notifications,
    }
}

/// A complete in-memory deployment wired to a fake Square backend.
pub struct TestShop {
    /// Shared application state.
    pub state: AppState,
    /// The public router.
    pub router: Router,
    /// Raw database handle for planting rows.
    pub db: Database,
    /// The fake provider.
    pub fake: FakeProvider,
}

impl TestShop {
    /// Build a deployment: in-memory database, migrated schema, Square
    /// selected, DATA_KEY present in the key cache, notifications routed
    /// to the capture server.
    pub async fn new() -> Self {
        let fake = spawn_fake_provider().await;

        let db = Database::open_in_memory().unwrap();
        migrations::migrate(&db).unwrap();

        let config = GatewayConfig::default();
        let state = AppState::build(db.clone(), config, DataKey::generate()).unwrap();

        // A login would normally recover DATA_KEY; tests plant it.
        state.keys.store(DataKey::generate());

        let settings = &state.settings;
        settings.set(setting_keys::PAYMENT_PROVIDER, "square").unwrap();
        settings.set(setting_keys::SQUARE_ACCESS_TOKEN, "sq-test-token").unwrap();
        settings.set(setting_keys::SQUARE_LOCATION_ID, "L_TEST").unwrap();
        settings
            .set(
                setting_keys::SQUARE_WEBHOOK_SIGNATURE_KEY,
                std::str::from_utf8(SIGNATURE_KEY).unwrap(),
            )
            .unwrap();
        settings
            .set(setting_keys::WEBHOOK_URL, &format!("{}/notify", fake.base_url))
            .unwrap();
        settings.set(setting_keys::CURRENCY_CODE, "USD").unwrap();

        let provider = PaymentProvider::Square(
            SquareProvider::new(
                "sq-test-token".into(),
                "L_TEST".into(),
                String::from_utf8(SIGNATURE_KEY.to_vec()).unwrap(),
                state.config.notification_url(),
            )
            .with_api_base(fake.base_url.clone()),
        );
        state.provider_cache.put(Arc::new(provider));

        let router = router(state.clone());
        Self {
            state,
            router,
            db,
            fake,
        }
    }

    /// Insert a product.
    pub fn add_product(&self, sku: &str, stock: i64, unit_price: i64) -> Product {
        self.state
            .products
            .insert(&NewProduct {
                sku: sku.into(),
                name: format!("{sku} product"),
                unit_price,
                stock,
                active: true,
            })
            .unwrap()
    }

    /// Sign a webhook body the way Square would for this deployment.
    pub fn sign_webhook(&self, body: &[u8]) -> String {
        let mut payload = self.state.config.notification_url().into_bytes();
        payload.extend_from_slice(body);
        BASE64.encode(hmac_sha256(SIGNATURE_KEY, &payload))
    }

    /// POST a signed webhook and return `(status, body)`.
    pub async fn deliver_webhook(&self, body: Value) -> (StatusCode, Value) {
        let raw = serde_json::to_vec(&body).unwrap();
        let signature = self.sign_webhook(&raw);
        self.request(
            Request::post("/payment/webhook")
                .header("content-type", "application/json")
                .header("x-square-hmacsha256-signature", signature)
                .body(axum::body::Body::from(raw))
                .unwrap(),
        )
        .await
    }

    /// POST JSON to a route.
    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(
            Request::post(path)
                .header("content-type", "application/json")
                .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    /// GET a route.
    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request(
            Request::get(path)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Drive one request through the router.
    pub async fn request(
        &self,
        request: Request<axum::body::Body>,
    ) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// A well-formed Square completion event for an order.
    pub fn completion_event(order_id: &str) -> Value {
        json!({
            "type": "payment.updated",
            "data": { "object": { "payment": {
                "status": "COMPLETED",
                "order_id": order_id,
            }}}
        })
    }

    /// A well-formed Square refund event for an order.
    pub fn refund_event(order_id: &str) -> Value {
        json!({
            "type": "refund.updated",
            "data": { "object": { "refund": {
                "status": "COMPLETED",
                "order_id": order_id,
            }}}
        })
    }

    /// A well-formed checkout body for one SKU.
    pub fn checkout_body(sku: &str, quantity: i64) -> Value {
        json!({
            "items": [{ "sku": sku, "quantity": quantity }],
            "success_url": "https://shop.example/thanks",
            "cancel_url": "https://shop.example/cart",
        })
    }
}
