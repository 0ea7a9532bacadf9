//! Structured output recovery
//!
//! The model is asked for exactly one JSON object but routinely wraps it in
//! prose, mangles a field, or ignores the schema entirely. This module turns
//! that unreliable output into a validated [`LanguageFeedback`], falling back
//! to a safe default instead of surfacing parse errors to the caller. Every
//! failure branch is logged with enough context for offline diagnosis.

use crate::types::LanguageFeedback;
use tracing::warn;

/// Envelope key the model is instructed to put its answer under.
pub const FEEDBACK_KEY: &str = "language_feedback";

const PREVIEW_CHARS: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no JSON object boundaries found")]
    NoJsonFound,

    #[error("JSON decode failed: {0}")]
    JsonDecode(#[from] serde_json::Error),
}

/// Slice the span from the first `{` to the last `}` (inclusive) and parse
/// it as JSON. Tolerates explanatory prose around the object, as long as the
/// prose itself contains no unbalanced braces.
pub fn extract_json_object(raw: &str) -> Result<serde_json::Value, ExtractError> {
    let (start, end) = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => return Err(ExtractError::NoJsonFound),
    };

    let candidate = raw[start..=end].trim();
    Ok(serde_json::from_str(candidate)?)
}

fn preview(raw: &str) -> String {
    raw.chars()
        .take(PREVIEW_CHARS)
        .collect::<String>()
        .replace('\n', "\\n")
}

/// Extract and validate a [`LanguageFeedback`] from raw model output.
/// Returns `None` on any failure; never propagates an error to the caller.
pub fn safe_parse_language_feedback(raw: &str) -> Option<LanguageFeedback> {
    let object = match extract_json_object(raw) {
        Ok(object) => object,
        Err(error) => {
            warn!(
                error = %error,
                preview = %preview(raw),
                "failed to extract JSON object from model output"
            );
            return None;
        }
    };

    let Some(envelope) = object.get(FEEDBACK_KEY) else {
        let keys: Vec<&str> = object
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default();
        warn!(?keys, "model output has no '{}' key", FEEDBACK_KEY);
        return None;
    };

    match serde_json::from_value::<LanguageFeedback>(envelope.clone()) {
        Ok(feedback) => Some(feedback),
        Err(error) => {
            warn!(
                error = %error,
                payload = %envelope,
                "language feedback failed schema validation"
            );
            None
        }
    }
}

/// Guaranteed-safe substitute used whenever parsing fails, so the response
/// contract is always satisfiable regardless of model misbehavior.
pub fn fallback_language_feedback(reason: impl Into<String>) -> LanguageFeedback {
    LanguageFeedback {
        items: Vec::new(),
        overall_comment: reason.into(),
    }
}
