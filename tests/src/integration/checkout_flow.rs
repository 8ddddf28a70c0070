//! Checkout endpoint choreography: validation, rate limiting, provider
//! session creation, and the authoritative reservation.

use crate::support::TestShop;
use axum::http::StatusCode;
use serde_json::json;
use shared_types::ReservationStatus;

#[tokio::test]
async fn checkout_reserves_and_returns_session() {
    let shop = TestShop::new().await;
    shop.add_product("A", 5, 1_000);

    let (status, body) = shop
        .post_json("/api/checkout", TestShop::checkout_body("A", 2))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    let session_id = body["sessionId"].as_str().unwrap();
    assert!(body["checkoutUrl"].as_str().unwrap().starts_with("https://pay.example/"));

    let reservations = shop.state.engine.list_by_session(session_id).unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].quantity, 2);
    assert_eq!(reservations[0].status, ReservationStatus::Pending);

    // Listed availability reflects the hold.
    let (_, products) = shop.get("/api/products").await;
    assert_eq!(products[0]["available"], 3);
}

#[tokio::test]
async fn checkout_rejects_malformed_bodies() {
    let shop = TestShop::new().await;
    shop.add_product("A", 5, 1_000);

    for (case, body) in [
        ("empty items", json!({"items": [], "success_url": "https://x.example", "cancel_url": "https://x.example"})),
        ("zero quantity", TestShop::checkout_body("A", 0)),
        ("unknown sku", TestShop::checkout_body("GHOST", 1)),
        (
            "bad url",
            json!({"items": [{"sku": "A", "quantity": 1}], "success_url": "ftp://x", "cancel_url": "https://x.example"}),
        ),
    ] {
        let (status, _) = shop.post_json("/api/checkout", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case: {case}");
    }

    // No provider session was ever created for a rejected cart.
    assert_eq!(shop.fake.sessions_created(), 0);
}

#[tokio::test]
async fn oversell_returns_structured_409() {
    let shop = TestShop::new().await;
    shop.add_product("A", 3, 1_000);

    let (status, body) = shop
        .post_json("/api/checkout", TestShop::checkout_body("A", 5))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "out_of_stock");
    assert_eq!(body["details"][0]["sku"], "A");
    assert_eq!(body["details"][0]["requested"], 5);
    assert_eq!(body["details"][0]["available"], 3);
}

#[tokio::test]
async fn concurrent_buyers_of_last_unit() {
    let shop = TestShop::new().await;
    let product = shop.add_product("A", 1, 1_000);

    let (first, second) = tokio::join!(
        shop.post_json("/api/checkout", TestShop::checkout_body("A", 1)),
        shop.post_json("/api/checkout", TestShop::checkout_body("A", 1)),
    );

    let statuses = [first.0, second.0];
    assert!(
        statuses.contains(&StatusCode::OK) && statuses.contains(&StatusCode::CONFLICT),
        "expected exactly one winner, got {statuses:?}"
    );

    // Exactly one pending reservation exists for the product.
    let pending: i64 = shop
        .db
        .with(|c| {
            c.query_row(
                "SELECT COUNT(*) FROM reservations WHERE product_id = ?1 AND status = 'pending'",
                [&product.id],
                |r| r.get(0),
            )
        })
        .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn unlimited_products_always_reserve() {
    let shop = TestShop::new().await;
    shop.add_product("A", -1, 500);

    let (status, _) = shop
        .post_json("/api/checkout", TestShop::checkout_body("A", 10_000))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, products) = shop.get("/api/products").await;
    assert_eq!(products[0]["available"], serde_json::Value::Null);
}

#[tokio::test]
async fn multi_line_cart_is_all_or_nothing() {
    let shop = TestShop::new().await;
    let a = shop.add_product("A", 5, 1_000);
    shop.add_product("B", 1, 2_000);

    let (status, body) = shop
        .post_json(
            "/api/checkout",
            json!({
                "items": [
                    { "sku": "A", "quantity": 2 },
                    { "sku": "B", "quantity": 3 },
                ],
                "success_url": "https://shop.example/thanks",
                "cancel_url": "https://shop.example/cart",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"][0]["sku"], "B");

    // The A line did not survive the rollback.
    let held: i64 = shop
        .db
        .with(|c| {
            c.query_row(
                "SELECT COUNT(*) FROM reservations WHERE product_id = ?1",
                [&a.id],
                |r| r.get(0),
            )
        })
        .unwrap();
    assert_eq!(held, 0);
}

#[tokio::test]
async fn checkout_rate_limit_locks_out() {
    let shop = TestShop::new().await;
    shop.add_product("A", 10_000, 100);

    // The checkout scope locks at 20 attempts from one IP.
    let mut last = StatusCode::OK;
    for _ in 0..20 {
        let (status, _) = shop
            .post_json("/api/checkout", TestShop::checkout_body("A", 1))
            .await;
        last = status;
    }
    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = shop
        .post_json("/api/checkout", TestShop::checkout_body("A", 1))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
