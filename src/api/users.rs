use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::staged::{list_confirmed, staged_routes, StagedResource};
use crate::auth::models::{AuthenticatedUser, Role};
use crate::auth::password::hash_password;
use crate::db::notification_repository::NotificationRepository;
use crate::db::staged_repository::StagedRepository;
use crate::error::AppError;
use crate::models::record::{new_record_id, AuditTrail};
use crate::models::user::{RegistrationRequest, User, UserView};
use crate::state::AppState;
use crate::workflow;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

#[async_trait]
impl StagedResource for User {
    type View = UserView;

    fn repository(state: &AppState) -> Arc<dyn StagedRepository<Self>> {
        state.users.clone()
    }

    fn can_read_confirmed(user: &AuthenticatedUser) -> bool {
        user.role == Role::Admin
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".into()));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(AppError::BadRequest(
            "Username may only contain letters, digits, '.', '_' and '-'".into(),
        ));
    }
    Ok(())
}

/// Validate a registration and file it as a pending user.
pub async fn process_registration(
    users: &dyn StagedRepository<User>,
    notifications: &dyn NotificationRepository,
    req: RegistrationRequest,
) -> Result<User, AppError> {
    let username = req.username.trim().to_string();
    validate_username(&username)?;

    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name cannot be empty".into()));
    }
    if !req.email.contains('@') {
        return Err(AppError::BadRequest("A valid e-mail address is required".into()));
    }

    let role = Role::from_str_ci(&req.role)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown role '{}'", req.role)))?;
    if !role.is_self_registrable() {
        return Err(AppError::BadRequest(format!(
            "Role '{role}' cannot be requested at registration"
        )));
    }

    if users.find_confirmed_by("username", &username).await?.is_some()
        || users.find_pending_by("username", &username).await?.is_some()
    {
        return Err(AppError::Conflict(format!("Username '{username}' is already taken")));
    }

    let user = User {
        id: new_record_id(),
        audit: AuditTrail::submitted(&username),
        username,
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        phone: req.phone,
        role,
        password_hash: hash_password(&req.password),
    };

    workflow::submit(users, notifications, user).await
}

/// `POST /api/users/register` — public self-registration.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    let user =
        process_registration(state.users.as_ref(), state.notifications.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Routes nested under `/api/users`.
pub fn routes() -> Router<AppState> {
    staged_routes::<User>(get(list_confirmed::<User>)).route("/register", post(register_handler))
}
