use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations/guest", get(handlers::guest_recommendations))
        .route(
            "/recommendations/user/:user_id",
            get(handlers::user_recommendations),
        )
        .route(
            "/recommendations/user/:user_id/cache",
            delete(handlers::invalidate_recommendations),
        )
        .route("/interactions", post(handlers::track_interaction))
}
