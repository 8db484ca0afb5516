use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use chrono::Utc;

use crate::auth::models::AuthenticatedUser;
use crate::auth::password::hash_token;
use crate::db::session_repository::SessionRepository;
use crate::error::AppError;
use crate::state::AppState;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "casfos_session";

/// Resolve a raw session token to the user it belongs to.
///
/// Expired sessions are deleted on sight.
pub async fn resolve_session(
    sessions: &dyn SessionRepository,
    token: &str,
) -> Result<AuthenticatedUser, AppError> {
    let token_hash = hash_token(token);
    let session = sessions
        .find(&token_hash)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid session".into()))?;

    if session.is_expired(Utc::now()) {
        if let Err(e) = sessions.delete(&token_hash).await {
            tracing::warn!("Failed to delete expired session: {e}");
        }
        return Err(AppError::Auth("Session expired".into()));
    }

    Ok(session.user)
}

/// Handlers taking an `AuthenticatedUser` argument require a valid session cookie.
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| AppError::Auth("Not logged in".into()))?;

        resolve_session(state.sessions.as_ref(), &token).await
    }
}
