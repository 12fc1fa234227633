use crate::{handlers::*, AppState};
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health and metrics
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics))
        // Eventarc posts to the service root, but any path is accepted
        .route("/", post(invoke))
        .route("/*path", post(invoke))
}

pub fn build_router(state: AppState) -> Router {
    create_router().with_state(state)
}
