//! Webhook ingress choreography: completion, replay, stale-claim
//! recovery, refund restock, and the outbound notification.

use crate::support::TestShop;
use axum::http::{Request, StatusCode};
use serde_json::json;
use shared_types::ReservationStatus;

/// Checkout then complete: the full reserve-confirm-notify path.
#[tokio::test]
async fn reserve_confirm_notify() {
    let shop = TestShop::new().await;
    shop.add_product("A", 5, 1_000);

    let (status, body) = shop
        .post_json("/api/checkout", TestShop::checkout_body("A", 2))
        .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let (status, body) = shop
        .deliver_webhook(TestShop::completion_event(&session_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], true);
    assert_eq!(body["confirmed"], 1);

    let reservations = shop.state.engine.list_by_session(&session_id).unwrap();
    assert_eq!(reservations[0].status, ReservationStatus::Confirmed);

    // Available stock reflects the sale.
    let (_, products) = shop.get("/api/products").await;
    assert_eq!(products[0]["available"], 3);

    // Exactly one order.completed notification reached the target.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let notifications = shop.fake.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["event_type"], "order.completed");
    assert_eq!(notifications[0]["provider_session_id"], session_id.as_str());
    assert_eq!(notifications[0]["currency"], "USD");
    assert_eq!(notifications[0]["line_items"][0]["sku"], "A");
    assert_eq!(notifications[0]["line_items"][0]["quantity"], 2);
}

#[tokio::test]
async fn replayed_completion_is_idempotent() {
    let shop = TestShop::new().await;
    let product = shop.add_product("A", 5, 1_000);
    shop.state
        .engine
        .reserve_one(&product.id, 2, "ord_replay")
        .unwrap();

    let (status, body) = shop
        .deliver_webhook(TestShop::completion_event("ord_replay"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], true);

    let (status, body) = shop
        .deliver_webhook(TestShop::completion_event("ord_replay"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["already_processed"], true);

    // Statuses identical across the two deliveries.
    let reservations = shop.state.engine.list_by_session("ord_replay").unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn stale_claim_is_reclaimed() {
    let shop = TestShop::new().await;
    let product = shop.add_product("A", 5, 1_000);
    shop.state
        .engine
        .reserve_one(&product.id, 1, "ord_stale")
        .unwrap();

    // A crashed handler left a claim ten minutes ago.
    let old = stockroom_store::time::to_iso(chrono::Utc::now() - chrono::Duration::minutes(10));
    shop.db
        .with(|c| {
            c.execute(
                "INSERT INTO processed_payments (provider_session_id, processed_at)
                 VALUES ('ord_stale', ?1)",
                [&old],
            )
        })
        .unwrap();

    let (status, body) = shop
        .deliver_webhook(TestShop::completion_event("ord_stale"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], true, "stale claim must be reclaimed");
    assert_eq!(body["confirmed"], 1);
}

#[tokio::test]
async fn refund_restocks_confirmed_reservations() {
    let shop = TestShop::new().await;
    let product = shop.add_product("A", 10, 1_000);
    shop.state
        .engine
        .reserve_one(&product.id, 3, "ord_refund")
        .unwrap();
    shop.state.engine.confirm("ord_refund").unwrap();

    let (_, products) = shop.get("/api/products").await;
    assert_eq!(products[0]["available"], 7);

    let (status, body) = shop
        .deliver_webhook(TestShop::refund_event("ord_refund"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["restocked"], 1);

    let reservations = shop.state.engine.list_by_session("ord_refund").unwrap();
    assert_eq!(reservations[0].status, ReservationStatus::Expired);
    let (_, products) = shop.get("/api/products").await;
    assert_eq!(products[0]["available"], 10);

    // Refund replay is a no-op.
    let (status, body) = shop
        .deliver_webhook(TestShop::refund_event("ord_refund"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["restocked"], 0);
}

#[tokio::test]
async fn unsigned_and_tampered_deliveries_rejected() {
    let shop = TestShop::new().await;
    let product = shop.add_product("A", 5, 1_000);
    shop.state
        .engine
        .reserve_one(&product.id, 1, "ord_sig")
        .unwrap();

    let event = TestShop::completion_event("ord_sig");
    let raw = serde_json::to_vec(&event).unwrap();

    // Missing header.
    let (status, _) = shop
        .request(
            Request::post("/payment/webhook")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(raw.clone()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Signature computed over different bytes.
    let signature = shop.sign_webhook(&raw);
    let mut tampered = raw.clone();
    let idx = tampered.len() / 2;
    tampered[idx] ^= 0x01;
    let (status, _) = shop
        .request(
            Request::post("/payment/webhook")
                .header("content-type", "application/json")
                .header("x-square-hmacsha256-signature", signature)
                .body(axum::body::Body::from(tampered))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Neither delivery moved the reservation.
    let reservations = shop.state.engine.list_by_session("ord_sig").unwrap();
    assert_eq!(reservations[0].status, ReservationStatus::Pending);
}

#[tokio::test]
async fn unrecognised_events_are_acknowledged() {
    let shop = TestShop::new().await;
    let (status, body) = shop
        .deliver_webhook(json!({ "type": "catalog.version.updated" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn unconfigured_provider_rejects_ingress() {
    let shop = TestShop::new().await;
    shop.state
        .settings
        .delete(stockroom_store::setting_keys::PAYMENT_PROVIDER)
        .unwrap();
    shop.state.provider_cache.invalidate();

    let (status, body) = shop
        .deliver_webhook(TestShop::completion_event("ord_x"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_configured");
}
