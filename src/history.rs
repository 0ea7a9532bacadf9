//! Context window trimming
//!
//! The generation backend has a fixed-size context window; these pure
//! functions bound a conversation history to a turn-count and character
//! budget before it is handed to the model. Trimming always keeps the most
//! recent turns and never splits a turn's content.

use crate::types::ChatTurn;

/// Keep only the last `max_turns` entries, preserving relative order.
pub fn clamp_turns(history: &[ChatTurn], max_turns: usize) -> Vec<ChatTurn> {
    if max_turns == 0 {
        return Vec::new();
    }
    if history.len() <= max_turns {
        return history.to_vec();
    }
    history[history.len() - max_turns..].to_vec()
}

/// Walk the history from the most recent entry backward, keeping entries
/// while the running character total stays within `max_chars`. The first
/// entry that would overflow stops the walk; older entries are dropped
/// whole, never truncated. Chronological order is restored in the result.
pub fn clamp_chars(history: &[ChatTurn], max_chars: usize) -> Vec<ChatTurn> {
    if max_chars == 0 {
        return Vec::new();
    }

    let mut total = 0usize;
    let mut kept: Vec<ChatTurn> = Vec::new();

    for turn in history.iter().rev() {
        let len = turn.content.chars().count();
        if total + len > max_chars {
            break;
        }
        kept.push(turn.clone());
        total += len;
    }

    kept.reverse();
    kept
}

/// Two-stage trim: turn-count clamp, then character-budget clamp over the
/// survivors. Deterministic and idempotent.
pub fn trim(history: &[ChatTurn], max_turns: usize, max_chars: usize) -> Vec<ChatTurn> {
    clamp_chars(&clamp_turns(history, max_turns), max_chars)
}

/// Truncate a single string to at most `max_chars` characters, appending an
/// ellipsis marker when truncation occurred. Used to bound the user's own
/// message independent of history.
pub fn trim_text(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
