use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::SESSION_COOKIE;
use crate::auth::models::AuthenticatedUser;
use crate::auth::password::{hash_token, new_session_token, verify_password};
use crate::db::session_repository::{SessionRecord, SessionRepository};
use crate::db::staged_repository::StagedRepository;
use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: AuthenticatedUser,
}

/// Check credentials against confirmed users and open a session.
///
/// Returns the raw session token (for the cookie) and the user.
pub async fn process_login(
    users: &dyn StagedRepository<User>,
    sessions: &dyn SessionRepository,
    username: &str,
    password: &str,
    session_hours: i64,
) -> Result<(String, AuthenticatedUser), AppError> {
    let username = username.trim();
    let Some(user) = users.find_confirmed_by("username", username).await? else {
        // Only someone holding the password learns that a registration is pending.
        if let Some(pending) = users.find_pending_by("username", username).await? {
            if verify_password(password, &pending.password_hash) {
                return Err(AppError::Forbidden(
                    "Registration is awaiting admin approval".into(),
                ));
            }
        }
        return Err(AppError::Auth("Invalid username or password".into()));
    };

    if !verify_password(password, &user.password_hash) {
        tracing::info!(username, "Failed login attempt");
        return Err(AppError::Auth("Invalid username or password".into()));
    }

    let authenticated = AuthenticatedUser {
        user_id: user.id,
        username: user.username,
        name: user.name,
        role: user.role,
    };

    let token = new_session_token();
    let now = Utc::now();
    sessions
        .create(&SessionRecord {
            token_hash: hash_token(&token),
            user: authenticated.clone(),
            created_at: now,
            expires_at: now + Duration::hours(session_hours),
        })
        .await?;

    tracing::info!(username = %authenticated.username, role = %authenticated.role, "User logged in");
    Ok((token, authenticated))
}

/// `POST /api/auth/login`
///
/// On success, sets the http-only session cookie and returns the user info.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let session_hours = state.config.server.session_hours;
    let (token, user) = process_login(
        state.users.as_ref(),
        state.sessions.as_ref(),
        &req.username,
        &req.password,
        session_hours,
    )
    .await?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.config.server.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(session_hours))
        .build();

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user,
        }),
    ))
}

/// `GET /api/auth/me`
pub async fn me_handler(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}

/// `POST /api/auth/logout` — deletes the session and clears the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<CookieJar, AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.delete(&hash_token(cookie.value())).await?;
    }

    let cookie = Cookie::build((SESSION_COOKIE, "")).path("/").removal().build();
    Ok(jar.remove(cookie))
}
