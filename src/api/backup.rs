use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::auth::models::{AuthenticatedUser, Role};
use crate::backup::{BackupJob, BackupStatus};
use crate::error::AppError;
use crate::state::AppState;

fn backup_job(
    state: &AppState,
    user: &AuthenticatedUser,
    action: &str,
) -> Result<Arc<BackupJob>, AppError> {
    user.require_any(&[Role::Admin], action)?;
    state
        .backup
        .clone()
        .ok_or_else(|| AppError::NotFound("Scheduled backups are not enabled".into()))
}

/// `GET /api/admin/backup` — schedule, running flag and last report.
pub async fn backup_status_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BackupStatus>, AppError> {
    let job = backup_job(&state, &user, "view backup status")?;
    Ok(Json(job.status()))
}

/// `POST /api/admin/backup` — start a run now; 409 if one is in progress.
pub async fn trigger_backup_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let job = backup_job(&state, &user, "start a backup")?;
    job.spawn_run()?;
    tracing::info!(requested_by = %user.username, "Manual backup started");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "message": "Backup started" })),
    ))
}

/// Routes nested under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/backup",
        get(backup_status_handler).post(trigger_backup_handler),
    )
}
