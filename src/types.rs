// Type definitions and enums

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation history. Order is chronological and
/// semantically meaningful; turns are never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Coarse language-proficiency tag selecting prompt style. Opaque to the
/// pipeline beyond being one of a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Level {
    A1,
    A2,
    B1,
    B2,
    C1,
}

impl Level {
    pub const DEFAULT: Level = Level::B1;

    /// Resolve an optional caller-supplied level string. Unknown or empty
    /// values fall back to the default rather than failing the request.
    pub fn resolve(raw: Option<&str>) -> Level {
        let Some(raw) = raw else {
            return Self::DEFAULT;
        };
        match raw.trim().to_ascii_uppercase().as_str() {
            "A1" => Level::A1,
            "A2" => Level::A2,
            "B1" => Level::B1,
            "B2" => Level::B2,
            "C1" => Level::C1,
            _ => Self::DEFAULT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::A1 => "A1",
            Level::A2 => "A2",
            Level::B1 => "B1",
            Level::B2 => "B2",
            Level::C1 => "C1",
        }
    }

    /// Level string reported in response metadata: the resolved level when
    /// the caller supplied one, the literal "auto" when they did not.
    pub fn meta_label(raw: Option<&str>) -> String {
        match raw {
            Some(value) if !value.trim().is_empty() => {
                Self::resolve(Some(value)).as_str().to_string()
            }
            _ => "auto".to_string(),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of mistake categories the feedback schema accepts. Anything
/// outside this set fails validation and triggers the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    Grammar,
    Spelling,
    Punctuation,
    Style,
    Vocabulary,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeedbackItem {
    /// Verbatim fragment copied from the user's message.
    pub source_fragment: String,
    pub category: FeedbackCategory,
    pub explanation: String,
    #[serde(default)]
    pub corrected_fragment: Option<String>,
}

/// Structured language feedback returned for a feedback job. Empty `items`
/// conventionally pairs with a "no mistakes" comment, but callers must check
/// both fields independently.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LanguageFeedback {
    pub items: Vec<FeedbackItem>,
    pub overall_comment: String,
}

/// Sampling knobs for one generation call; tuned separately for reply and
/// feedback jobs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// Input to a single generation call. Built fresh per job from an already
/// trimmed history; never persisted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub history: Vec<ChatTurn>,
    pub user_message: String,
    pub params: SamplingParams,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job timed out")]
    JobTimeout,

    #[error("job failed: {0}")]
    JobFailed(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::JobTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "The tutor is busy right now. Please try again.".to_string(),
            ),
            AppError::InvalidRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The tutor is temporarily unavailable. Please try again.".to_string(),
            ),
        };

        // Full error stays in the logs; the body carries only the safe message.
        tracing::error!(status = %status, error = %self, "request failed");

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
