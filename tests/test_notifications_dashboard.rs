mod common;

use axum::http::StatusCode;
use casfos::auth::models::Role;

fn kind<'a>(dashboard: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
    dashboard["kinds"]
        .as_array()
        .unwrap()
        .iter()
        .find(|k| k["kind"].as_str() == Some(name))
        .unwrap()
}

#[tokio::test]
async fn submission_notifies_approver_role() {
    let env = common::TestEnv::start().await;
    let keeper = env.session_for(Role::Storekeeper).await;
    let manager = env.session_for(Role::AssetManager).await;

    keeper
        .post("/api/assets/purchases")
        .json(&common::purchase_body(3))
        .await
        .assert_status(StatusCode::CREATED);

    let notifications: Vec<serde_json::Value> = manager.get("/api/notifications").await.json();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["recipient_role"].as_str(), Some("asset_manager"));
    assert_eq!(notifications[0]["kind"].as_str(), Some("asset_purchase"));
    assert_eq!(notifications[0]["read"].as_bool(), Some(false));

    let keeper_inbox: Vec<serde_json::Value> = keeper.get("/api/notifications").await.json();
    assert!(keeper_inbox.is_empty());
}

#[tokio::test]
async fn mark_read_only_for_recipient() {
    let env = common::TestEnv::start().await;
    let keeper = env.session_for(Role::Storekeeper).await;
    let manager = env.session_for(Role::AssetManager).await;

    keeper
        .post("/api/assets/purchases")
        .json(&common::purchase_body(3))
        .await
        .assert_status(StatusCode::CREATED);
    let notifications: Vec<serde_json::Value> = manager.get("/api/notifications").await.json();
    let id = notifications[0]["_id"].as_str().unwrap().to_string();

    keeper
        .put(&format!("/api/notifications/{id}/read"))
        .await
        .assert_status_not_found();
    manager
        .put(&format!("/api/notifications/{id}/read"))
        .await
        .assert_status_ok();

    let unread: Vec<serde_json::Value> = manager
        .get("/api/notifications")
        .add_query_param("unread_only", true)
        .await
        .json();
    assert!(unread.is_empty());
}

#[tokio::test]
async fn approval_notifies_submitter() {
    let env = common::TestEnv::start().await;
    let keeper = env.session_for(Role::Storekeeper).await;
    let manager = env.session_for(Role::AssetManager).await;

    let body: serde_json::Value = keeper
        .post("/api/assets/purchases")
        .json(&common::purchase_body(3))
        .await
        .json();
    let id = body["_id"].as_str().unwrap();
    manager
        .put(&format!("/api/assets/purchases/approve/{id}"))
        .await
        .assert_status_ok();

    let inbox: Vec<serde_json::Value> = keeper.get("/api/notifications").await.json();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["recipient_user"].as_str(), Some("storekeeper"));
    assert!(inbox[0]["message"].as_str().unwrap().contains("approved by asset_manager"));
}

#[tokio::test]
async fn dashboard_counts_for_role() {
    let env = common::TestEnv::start().await;
    let keeper = env.session_for(Role::Storekeeper).await;
    let manager = env.session_for(Role::AssetManager).await;

    for quantity in [2, 3] {
        keeper
            .post("/api/assets/purchases")
            .json(&common::purchase_body(quantity))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let dashboard: serde_json::Value = manager.get("/api/dashboard").await.json();
    assert_eq!(dashboard["user"]["role"].as_str(), Some("asset_manager"));
    assert_eq!(kind(&dashboard, "asset_purchase")["pending"].as_u64(), Some(2));
    assert!(kind(&dashboard, "faculty")["pending"].is_null());
    assert_eq!(dashboard["unread_notifications"].as_u64(), Some(2));
    assert_eq!(dashboard["stock"]["items"].as_u64(), Some(0));

    let pending: Vec<serde_json::Value> = manager.get("/api/assets/purchases/pending").await.json();
    let id = pending[0]["_id"].as_str().unwrap();
    manager
        .put(&format!("/api/assets/purchases/approve/{id}"))
        .await
        .assert_status_ok();

    let dashboard: serde_json::Value = keeper.get("/api/dashboard").await.json();
    assert!(kind(&dashboard, "asset_purchase")["pending"].is_null());
    assert_eq!(kind(&dashboard, "asset_purchase")["confirmed"].as_u64(), Some(1));
    assert_eq!(dashboard["stock"]["items"].as_u64(), Some(1));
    assert_eq!(dashboard["unread_notifications"].as_u64(), Some(1));
}
