// App state and API request/response types

use crate::config::Config;
use crate::queue::JobStore;
use crate::types::{ChatTurn, LanguageFeedback};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<JobStore>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ReplyRequest {
    pub level: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    pub message: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ReplyResponse {
    pub reply: String,
    pub meta: ResponseMeta,
}

#[derive(Debug, serde::Deserialize)]
pub struct FeedbackRequest {
    pub level: Option<String>,
    pub message: String,
}

#[derive(Debug, serde::Serialize)]
pub struct FeedbackResponse {
    pub language_feedback: LanguageFeedback,
    pub meta: ResponseMeta,
}

#[derive(Debug, serde::Serialize)]
pub struct ResponseMeta {
    pub latency_ms: u64,
    pub mode: String,
    pub level: String,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub timestamp: String,
}
