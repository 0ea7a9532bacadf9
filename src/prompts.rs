//! System prompt selection
//!
//! One entrypoint, [`system_prompt`], keyed by job kind and proficiency
//! level. Reply prompts steer a conversational tutor; feedback prompts
//! demand a single strict JSON object matching the recovery schema.

use crate::types::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Reply,
    Feedback,
}

const REPLY_BASE: &str = "\
You are an AI English Conversation Tutor.
Have a natural, friendly conversation in English and help the user practice.
Stay within everyday topics (hobbies, study/work, travel, relationships, lifestyle, feelings, culture, plans).

Rules:
- Reply in English.
- Be warm and supportive.
- Infer the user's meaning even if their English is broken.
- Ask at least one follow-up question.
- If the user asks about programming, math, ML, or other unrelated topics: briefly refuse and redirect to English practice.
";

const FEEDBACK_BASE: &str = "\
You are an English language checker.
Analyse ONLY the user's last message in English. Find up to 5 important mistakes.

Return EXACTLY ONE valid JSON object and NOTHING else.
No markdown, no backticks, no extra text.

Output JSON schema (example):
{
  \"language_feedback\": {
    \"items\": [
      {
        \"source_fragment\": \"...\",
        \"category\": \"grammar\",
        \"explanation\": \"...\",
        \"corrected_fragment\": \"...\"
      }
    ],
    \"overall_comment\": \"...\"
  }
}

Rules:
- category must be one of: grammar, spelling, punctuation, style, vocabulary
- source_fragment must be an exact fragment copied from the user's message
- If there are no mistakes: items must be [] and overall_comment must be \"No mistakes — great job!\"
";

fn reply_level_rules(level: Level) -> &'static str {
    match level {
        Level::A1 => {
            "LANGUAGE LEVEL: A1\n\
             - Use very short, simple sentences.\n\
             - Use very common words.\n\
             - Use mostly Present Simple.\n\
             - Ask only 1 short follow-up question.\n"
        }
        Level::A2 => {
            "LANGUAGE LEVEL: A2\n\
             - Use simple sentences and common vocabulary.\n\
             - Use Present Simple, Present Continuous, and Past Simple when needed.\n\
             - Avoid idioms.\n\
             - Ask 1-2 follow-up questions.\n"
        }
        Level::B1 => {
            "LANGUAGE LEVEL: B1\n\
             - Use clear, natural conversational English.\n\
             - Prefer common vocabulary.\n\
             - Avoid complex grammar.\n\
             - Ask 1-2 follow-up questions.\n"
        }
        Level::B2 => {
            "LANGUAGE LEVEL: B2\n\
             - Use fluent, natural English with richer vocabulary.\n\
             - You may use common idioms and phrasal verbs, but keep it friendly.\n\
             - Ask 2-3 follow-up questions.\n"
        }
        Level::C1 => {
            "LANGUAGE LEVEL: C1\n\
             - Use near-native, natural English.\n\
             - Use nuanced vocabulary, but keep it conversational, not academic.\n\
             - Ask 2-3 follow-up questions.\n"
        }
    }
}

fn feedback_level_rules(level: Level) -> &'static str {
    match level {
        Level::A1 => "EXPLANATION STYLE: A1\n- Explain very simply, in short words.\n",
        Level::A2 => "EXPLANATION STYLE: A2\n- Explain simply and briefly.\n",
        Level::B1 => "EXPLANATION STYLE: B1\n- Keep explanations short and clear.\n",
        Level::B2 => {
            "EXPLANATION STYLE: B2\n- Explanations can be a bit more detailed, but still concise.\n"
        }
        Level::C1 => "EXPLANATION STYLE: C1\n- Keep explanations minimal and precise.\n",
    }
}

/// Assemble the system prompt for one generation call.
pub fn system_prompt(level: Level, kind: PromptKind) -> String {
    match kind {
        PromptKind::Reply => format!("{}\n{}", REPLY_BASE, reply_level_rules(level)),
        PromptKind::Feedback => format!("{}\n{}", FEEDBACK_BASE, feedback_level_rules(level)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_prompt_carries_level_rules() {
        let prompt = system_prompt(Level::A1, PromptKind::Reply);
        assert!(prompt.contains("Conversation Tutor"));
        assert!(prompt.contains("LANGUAGE LEVEL: A1"));
    }

    #[test]
    fn test_feedback_prompt_demands_json_envelope() {
        let prompt = system_prompt(Level::C1, PromptKind::Feedback);
        assert!(prompt.contains("language_feedback"));
        assert!(prompt.contains("EXACTLY ONE valid JSON object"));
        assert!(prompt.contains("EXPLANATION STYLE: C1"));
    }

    #[test]
    fn test_feedback_prompt_lists_closed_categories() {
        let prompt = system_prompt(Level::B1, PromptKind::Feedback);
        assert!(prompt.contains("grammar, spelling, punctuation, style, vocabulary"));
    }
}
