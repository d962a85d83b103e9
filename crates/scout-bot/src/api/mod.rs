pub mod dto;
pub mod handlers;

use axum::{routing::get, Router};

use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // Health check
        .route("/health", get(handlers::health_check))
}
