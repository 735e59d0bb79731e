use crate::api::handlers::{health, research};
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Research API routes, mounted under `/api`
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/research", post(research::start_research))
        .route("/research/stream", post(research::stream_research))
        .route(
            "/research/{thread_id}",
            get(research::get_research).delete(research::discard_research),
        )
        .route(
            "/research/{thread_id}/feedback",
            post(research::submit_feedback),
        )
        .route(
            "/research/{thread_id}/feedback/stream",
            post(research::stream_feedback),
        )
}

/// Full application router with tracing and CORS
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", create_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
