// Tutor Worker - asynchronous inference job pipeline for an English-tutor
// text-generation backend

pub mod config;
pub mod feedback;
pub mod generation;
pub mod history;
pub mod models;
pub mod prompts;
pub mod queue;
pub mod routes;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
