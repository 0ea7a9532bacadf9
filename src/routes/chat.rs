//! Reply and feedback endpoints
//!
//! Each handler enqueues a job, suspends in the wait protocol's poll loop
//! (non-blockingly for other handlers), and translates the outcome into a
//! response: 504 on wait timeout, 500 on execution failure. Every response
//! carries an `x-request-id` correlation header, echoed from the request or
//! generated here.

use crate::models::{
    AppState, FeedbackRequest, FeedbackResponse, ReplyRequest, ReplyResponse, ResponseMeta,
};
use crate::queue::jobs::{FeedbackResult, JobPayload, ReplyResult};
use crate::types::{AppResult, Level};
use axum::extract::State;
use axum::http::header::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/reply", post(post_reply))
        .route("/api/v1/feedback", post(post_feedback))
        .with_state(state)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn wait_budget(state: &AppState) -> (Duration, Duration) {
    (
        Duration::from_secs(state.config.queue.wait_timeout_secs),
        Duration::from_millis(state.config.queue.poll_interval_ms),
    )
}

async fn post_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReplyRequest>,
) -> Response {
    let request_id = correlation_id(&headers);
    info!(
        request_id = %request_id,
        history_turns = request.history.len(),
        msg_len = request.message.chars().count(),
        "reply request received"
    );

    let response = match handle_reply(&state, request).await {
        Ok(body) => Json(body).into_response(),
        Err(error) => error.into_response(),
    };
    with_request_id(response, &request_id)
}

async fn handle_reply(state: &AppState, request: ReplyRequest) -> AppResult<ReplyResponse> {
    let started = Instant::now();
    let level_label = Level::meta_label(request.level.as_deref());

    let job_id = state
        .store
        .enqueue(JobPayload::Reply {
            level: request.level,
            history: request.history,
            message: request.message,
        })
        .await?;

    let (timeout, interval) = wait_budget(state);
    let value = state.store.wait(job_id, timeout, interval).await?;
    let result: ReplyResult = serde_json::from_value(value)?;

    Ok(ReplyResponse {
        reply: result.reply,
        meta: ResponseMeta {
            latency_ms: started.elapsed().as_millis() as u64,
            mode: "reply".to_string(),
            level: level_label,
        },
    })
}

async fn post_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<FeedbackRequest>,
) -> Response {
    let request_id = correlation_id(&headers);
    info!(
        request_id = %request_id,
        msg_len = request.message.chars().count(),
        "feedback request received"
    );

    let response = match handle_feedback(&state, request).await {
        Ok(body) => Json(body).into_response(),
        Err(error) => error.into_response(),
    };
    with_request_id(response, &request_id)
}

async fn handle_feedback(
    state: &AppState,
    request: FeedbackRequest,
) -> AppResult<FeedbackResponse> {
    let started = Instant::now();
    let level_label = Level::meta_label(request.level.as_deref());

    let job_id = state
        .store
        .enqueue(JobPayload::Feedback {
            level: request.level,
            message: request.message,
        })
        .await?;

    let (timeout, interval) = wait_budget(state);
    let value = state.store.wait(job_id, timeout, interval).await?;
    let result: FeedbackResult = serde_json::from_value(value)?;

    Ok(FeedbackResponse {
        language_feedback: result.language_feedback,
        meta: ResponseMeta {
            latency_ms: started.elapsed().as_millis() as u64,
            mode: "feedback".to_string(),
            level: level_label,
        },
    })
}
