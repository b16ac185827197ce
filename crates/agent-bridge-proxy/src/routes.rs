//! Route definitions and router construction for the HTTP surface.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::CorsConfig;
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Create the HTTP router.
///
/// Local routes only claim the methods they serve; any other method on the
/// same path, like any unknown path, is relayed to the agent.
pub fn create_router(state: AppState, cors_config: &CorsConfig) -> Router {
    let relay = handlers::passthrough::forward;
    let body_limit = state.config.body_limit;

    Router::new()
        // Admin
        .route(
            "/admin/set-mode",
            get(handlers::admin::set_mode).fallback(relay),
        )
        .route(
            "/admin/get-mode",
            get(handlers::admin::get_mode).fallback(relay),
        )
        .route("/admin/status", get(handlers::admin::status).fallback(relay))
        // OpenAI-compatible surface
        .route("/v1/models", get(handlers::models::list).fallback(relay))
        .route(
            "/v1/chat/completions",
            post(handlers::chat::completions).fallback(relay),
        )
        // Everything else goes to the agent
        .fallback(relay)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(build_cors_layer(cors_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
