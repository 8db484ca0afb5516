use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// `GET /api/notifications` — addressed to the caller or the caller's role, newest first.
pub async fn list_notifications_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state
        .notifications
        .list_for(&user.username, user.role, query.unread_only)
        .await?;
    Ok(Json(notifications))
}

/// `PUT /api/notifications/{id}/read`
pub async fn mark_read_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state
        .notifications
        .mark_read(&id, &user.username, user.role)
        .await?
    {
        return Err(AppError::NotFound(format!("Notification '{id}' not found")));
    }
    Ok(Json(serde_json::json!({ "id": id, "read": true })))
}

/// Routes nested under `/api/notifications`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications_handler))
        .route("/{id}/read", put(mark_read_handler))
}
