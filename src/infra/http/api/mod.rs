pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

use super::health;

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/threads", post(handlers::create_thread))
        .route("/api/v1/threads/{id}/views", post(handlers::record_view))
        .route("/api/v1/threads/{id}/similar", get(handlers::similar_threads))
        .route("/api/v1/threads/{id}/tags", get(handlers::list_thread_tags))
        .route("/api/v1/trending", get(handlers::trending))
        .route(
            "/api/v1/tags",
            get(handlers::list_tags).post(handlers::create_tag),
        )
        .route("/api/v1/tags/{id}/threads", post(handlers::assign_tag))
        .route("/api/v1/categories", post(handlers::create_category))
        .route("/api/v1/homepage", get(handlers::homepage))
        .route(
            "/api/v1/admin/trending/refresh",
            post(handlers::refresh_trending),
        )
        .route("/api/v1/admin/views/drain", post(handlers::drain_views))
        .route("/health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
