// ABOUTME: HTTP API layer for evald providing the eval, script and health endpoints
// ABOUTME: Integration layer wiring the staging store and sandbox orchestrator into axum routes

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub mod error;
pub mod eval_handlers;
pub mod health_handlers;
pub mod relay;
pub mod script_handlers;
pub mod state;

pub use error::{ApiResult, AppError};
pub use relay::relay;
pub use state::AppState;

/// Creates the service router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_code_bytes;

    Router::new()
        .route("/up", get(health_handlers::up))
        .route("/scripts/{id}", get(script_handlers::get_script))
        .route("/eval", post(eval_handlers::eval))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
