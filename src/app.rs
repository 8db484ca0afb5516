use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::session;
use crate::config::AppConfig;
use crate::state::AppState;

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// All REST routes, without middleware. Integration tests mount this directly.
pub fn api_router(config: &AppConfig) -> Router<AppState> {
    let auth = Router::new()
        .route("/login", post(session::login_handler))
        .route("/me", get(session::me_handler))
        .route("/logout", post(session::logout_handler));

    let uploads = Router::new()
        .route(
            "/",
            post(api::upload::upload_handler)
                .layer(DefaultBodyLimit::max(config.uploads.body_limit())),
        )
        .route("/{name}", get(api::upload::serve_upload_handler));

    Router::new()
        .nest("/api/auth", auth)
        .nest("/api/users", api::users::routes())
        .nest("/api/faculty", api::faculty::routes())
        .nest("/api/faculty-updates", api::faculty::update_routes())
        .nest("/api/assets", api::assets::routes())
        .nest("/api/notifications", api::notifications::routes())
        .route("/api/dashboard", get(api::dashboard::dashboard_handler))
        .nest("/api/uploads", uploads)
        .nest("/api/admin", api::backup::routes())
        .route("/health", get(health_handler))
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
    )
}

/// The complete application: API routes, optional static frontend, CORS and
/// request tracing.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();
    let mut router = api_router(&config);

    if let Some(dir) = &config.server.static_dir {
        let index = std::path::Path::new(dir).join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }
    if let Some(cors) = cors_layer(&config.server.allowed_origins) {
        router = router.layer(cors);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
