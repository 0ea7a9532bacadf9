//! API Routes
//!
//! HTTP surface of the pipeline:
//! - `POST /api/v1/reply` - conversational reply generation
//! - `POST /api/v1/feedback` - structured language feedback
//! - `GET /api/v1/health` - liveness and model identity

pub mod chat;
pub mod health;

use crate::models::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(chat::router(state.clone()))
        .merge(health::router(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}
