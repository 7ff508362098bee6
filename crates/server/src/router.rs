use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the application router with CORS for the configured frontend
/// origin and request tracing.
pub fn create_router(state: AppState) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);
    if let Ok(origin) = state.config.frontend_url.parse::<HeaderValue>() {
        cors = cors.allow_origin(origin);
    }

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/dropbox/url", get(handlers::auth_url))
        .route("/api/auth/dropbox/callback", post(handlers::auth_callback))
        .route("/api/dropbox/list", post(handlers::list_files))
        .route("/api/dropbox/download", post(handlers::download_file))
        .route("/api/ocr/process", post(handlers::process_single))
        .route("/api/ocr/process-batch", post(handlers::process_batch))
        .route("/api/export/csv", post(handlers::export_csv))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
