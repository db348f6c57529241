use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use rover::middleware::request_key::{RequestKey, RequestPage};
use rover::{set_request_key, set_request_page, timing_middleware, Rover};

use crate::handlers;
use crate::AppState;

/// Builds the demo `Router`: a small user API, timed by `rover`, plus the
/// metrics endpoints that read back what the timing layer recorded.
pub fn create_router(state: Arc<AppState>, rover: Rover) -> Router {
    Router::new()
        // ── User endpoints ──────────────────────────────────────
        .route(
            "/api/users",
            get(handlers::users::list_users)
                .route_layer(from_fn_with_state(
                    RequestKey::new("get.list_users.timing"),
                    set_request_key,
                ))
                .post(handlers::users::create_user),
        )
        .route("/api/users/:id", get(handlers::users::get_user))
        // ── Metrics ─────────────────────────────────────────────
        .route("/api/metrics", get(handlers::metrics::get_metrics))
        .route("/api/metrics/reset", post(handlers::metrics::reset_metrics))
        .route("/api/metrics/stream", get(handlers::metrics::metrics_stream))
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(from_fn_with_state(
            RequestPage::new("api"),
            set_request_page,
        ))
        .layer(from_fn_with_state(rover, timing_middleware))
        .layer(CorsLayer::permissive())
}
