//! Generation capability seam
//!
//! The model is an opaque, possibly slow, single-instance collaborator.
//! [`TextGenerator`] is the only surface the pipeline sees, which keeps the
//! backend substitutable in tests. The shipped implementation speaks the
//! OpenAI-compatible chat-completions protocol of a local model server.

use crate::config::GenerationConfig;
use crate::types::{AppError, AppResult, GenerationRequest};
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one generation call to completion. No retry, no cancellation:
    /// once started, the call runs until the backend answers or errors.
    async fn generate(&self, request: &GenerationRequest) -> AppResult<String>;
}

pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        }));
        for turn in &request.history {
            messages.push(serde_json::json!({
                "role": turn.role,
                "content": turn.content,
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": request.user_message,
        }));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.params.max_new_tokens,
            "temperature": request.params.temperature,
            "top_p": request.params.top_p,
        })
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> AppResult<String> {
        let body = self.build_body(request);
        debug!(
            model = %self.model,
            history_turns = request.history.len(),
            max_new_tokens = request.params.max_new_tokens,
            "sending generation request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("generation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "generation backend returned {status}: {detail}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("generation response decode failed: {e}")))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AppError::Generation("generation response has no message content".to_string())
            })?;

        Ok(content.trim().to_string())
    }
}
