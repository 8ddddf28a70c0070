//! Setup, login, session recovery, and the password-change re-wrap.

use crate::support::TestShop;
use axum::http::{Request, StatusCode};
use serde_json::json;
use stockroom_store::setting_keys;

const P1: &str = "correct-horse-battery-staple";
const P2: &str = "a-different-long-password";

fn wrapped_data_key(shop: &TestShop) -> String {
    shop.db
        .with(|c| c.query_row("SELECT wrapped_data_key FROM users", [], |r| r.get(0)))
        .unwrap()
}

#[tokio::test]
async fn setup_login_and_password_change_rewraps() {
    let shop = TestShop::new().await;

    // One-shot setup; a second run must refuse.
    shop.state.auth.initial_setup("admin", P1).unwrap();
    assert!(shop.state.auth.initial_setup("admin", P1).is_err());
    assert_eq!(
        shop.state
            .settings
            .get(setting_keys::SETUP_COMPLETE)
            .unwrap()
            .as_deref(),
        Some("1")
    );

    // Plant a secret while DATA_KEY is cached, then forget the key; the
    // next login must recover it.
    shop.state
        .settings
        .set(setting_keys::STRIPE_SECRET_KEY, "sk_live_sentinel")
        .unwrap();
    let w1 = wrapped_data_key(&shop);
    shop.state.keys.clear();
    assert!(shop.state.settings.get(setting_keys::STRIPE_SECRET_KEY).is_err());

    let (status, body) = shop
        .post_json("/api/auth/login", json!({ "username": "admin", "password": P1 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(
        shop.state
            .settings
            .get(setting_keys::STRIPE_SECRET_KEY)
            .unwrap()
            .as_deref(),
        Some("sk_live_sentinel")
    );

    // Change the password over the API.
    let (status, _) = shop
        .request(
            Request::post("/api/auth/password")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(axum::body::Body::from(
                    serde_json::to_vec(&json!({
                        "current_password": P1,
                        "new_password": P2,
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The wrapping changed; the ciphertexts did not.
    let w2 = wrapped_data_key(&shop);
    assert_ne!(w1, w2, "password change must re-wrap DATA_KEY");

    // Every session is gone.
    let sessions: i64 = shop
        .db
        .with(|c| c.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0)))
        .unwrap();
    assert_eq!(sessions, 0);

    // Old password fails, new one works, the secret still decrypts.
    shop.state.keys.clear();
    let (status, _) = shop
        .post_json("/api/auth/login", json!({ "username": "admin", "password": P1 }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = shop
        .post_json("/api/auth/login", json!({ "username": "admin", "password": P2 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        shop.state
            .settings
            .get(setting_keys::STRIPE_SECRET_KEY)
            .unwrap()
            .as_deref(),
        Some("sk_live_sentinel")
    );
}

#[tokio::test]
async fn session_tokens_resolve_until_logout() {
    let shop = TestShop::new().await;
    shop.state.auth.initial_setup("admin", P1).unwrap();

    let (_, body) = shop
        .post_json("/api/auth/login", json!({ "username": "admin", "password": P1 }))
        .await;
    let token = body["token"].as_str().unwrap().to_string();

    assert!(shop.state.auth.resolve_session(&token).unwrap().is_some());
    // Tokens never hit the table verbatim.
    let stored: i64 = shop
        .db
        .with(|c| {
            c.query_row(
                "SELECT COUNT(*) FROM sessions WHERE token_hash = ?1",
                [&token],
                |r| r.get(0),
            )
        })
        .unwrap();
    assert_eq!(stored, 0);

    let (status, _) = shop
        .request(
            Request::post("/api/auth/logout")
                .header("authorization", format!("Bearer {token}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(shop.state.auth.resolve_session(&token).unwrap().is_none());
}

#[tokio::test]
async fn failed_logins_lock_the_ip() {
    let shop = TestShop::new().await;
    shop.state.auth.initial_setup("admin", P1).unwrap();

    // The login scope locks at 5 attempts.
    let mut last = StatusCode::OK;
    for _ in 0..5 {
        let (status, _) = shop
            .post_json(
                "/api/auth/login",
                json!({ "username": "admin", "password": "wrong" }),
            )
            .await;
        last = status;
    }
    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);

    // Even the correct password is refused while locked.
    let (status, _) = shop
        .post_json("/api/auth/login", json!({ "username": "admin", "password": P1 }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unknown_users_are_indistinguishable() {
    let shop = TestShop::new().await;
    shop.state.auth.initial_setup("admin", P1).unwrap();

    let (status, body) = shop
        .post_json(
            "/api/auth/login",
            json!({ "username": "nobody", "password": P1 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid credentials");
}
