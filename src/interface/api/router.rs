//! API router configuration

use super::call_handler::{handle_event, handle_update, AppState};
use super::stream_handler::{handle_call_stream, health_check};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/event", post(handle_event))
        .route("/update", post(handle_update))
        .route("/call", post(handle_call_stream))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
