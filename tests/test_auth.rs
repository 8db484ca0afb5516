mod common;

use casfos::auth::models::Role;

#[tokio::test]
async fn login_success_sets_cookie() {
    let env = common::TestEnv::start().await;
    let server = env.server();

    let response = server
        .post("/api/auth/login")
        .json(&serde_json::json!({
            "username": "admin",
            "password": common::PASSWORD
        }))
        .await;

    response.assert_status_ok();
    let cookie = response.cookie("casfos_session");
    assert!(!cookie.value().is_empty());
    assert_eq!(cookie.http_only(), Some(true));

    let body: serde_json::Value = response.json();
    assert_eq!(body["message"].as_str(), Some("Login successful"));
    assert_eq!(body["user"]["role"].as_str(), Some("admin"));
}

#[tokio::test]
async fn login_invalid_credentials() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    let response = server
        .post("/api/auth/login")
        .json(&serde_json::json!({
            "username": "admin",
            "password": "wrongpassword"
        }))
        .await;
    response.assert_status_unauthorized();

    let response = server
        .post("/api/auth/login")
        .json(&serde_json::json!({
            "username": "nobody",
            "password": "wrongpassword"
        }))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn me_with_valid_cookie() {
    let env = common::TestEnv::start().await;
    let server = env.session_for(Role::Storekeeper).await;

    let response = server.get("/api/auth/me").await;
    response.assert_status_ok();

    let user: serde_json::Value = response.json();
    assert_eq!(user["username"].as_str(), Some("storekeeper"));
    assert_eq!(user["role"].as_str(), Some("storekeeper"));
}

#[tokio::test]
async fn me_without_cookie_is_unauthorized() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    server.get("/api/auth/me").await.assert_status_unauthorized();
    server.get("/api/dashboard").await.assert_status_unauthorized();
}

#[tokio::test]
async fn forged_session_cookie_is_rejected() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    server
        .get("/api/auth/me")
        .add_cookie(cookie::Cookie::new("casfos_session", "not-a-real-token"))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn logout_ends_session() {
    let env = common::TestEnv::start().await;
    let server = env.login_as("admin").await;

    server.get("/api/auth/me").await.assert_status_ok();
    server.post("/api/auth/logout").await.assert_status_ok();
    server.get("/api/auth/me").await.assert_status_unauthorized();
}

#[tokio::test]
async fn pending_registration_cannot_log_in() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    server
        .post("/api/users/register")
        .json(&serde_json::json!({
            "username": "newkeeper",
            "password": common::PASSWORD,
            "name": "New Keeper",
            "email": "newkeeper@casfos.test",
            "role": "storekeeper"
        }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    server
        .post("/api/auth/login")
        .json(&serde_json::json!({
            "username": "newkeeper",
            "password": common::PASSWORD
        }))
        .await
        .assert_status_forbidden();

    server
        .post("/api/auth/login")
        .json(&serde_json::json!({
            "username": "newkeeper",
            "password": "not-the-password"
        }))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn sessions_expire_through_ttl_index() {
    use futures::TryStreamExt;
    use mongodb::bson::{doc, Document};

    let env = common::TestEnv::start().await;
    env.login_as("admin").await;

    let sessions = env.db.collection::<Document>("sessions");
    let indexes: Vec<mongodb::IndexModel> = sessions
        .list_indexes()
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let ttl = indexes
        .iter()
        .find(|index| index.keys.contains_key("expires_at"))
        .expect("no index on expires_at");
    assert_eq!(
        ttl.options.as_ref().and_then(|o| o.expire_after),
        Some(std::time::Duration::ZERO)
    );

    let stored = sessions.find_one(doc! {}).await.unwrap().unwrap();
    assert!(stored.get_datetime("expires_at").is_ok());
}

#[tokio::test]
async fn health_is_public() {
    let env = common::TestEnv::start().await;
    let server = env.server();

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"].as_str(), Some("ok"));
}
