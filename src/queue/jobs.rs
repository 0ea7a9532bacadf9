//! Job data model
//!
//! One [`JobRecord`] per unit of asynchronous work. Created by the request
//! handler at enqueue, mutated only by the worker that dequeues it, read-only
//! to the polling handler, and expired by redis after the result retention
//! period.

use crate::types::{ChatTurn, LanguageFeedback};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Reply,
    Feedback,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Reply => write!(f, "reply"),
            JobKind::Feedback => write!(f, "feedback"),
        }
    }
}

/// Forward-only lifecycle; there is no transition out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Reply {
        level: Option<String>,
        history: Vec<ChatTurn>,
        message: String,
    },
    Feedback {
        level: Option<String>,
        message: String,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Reply { .. } => JobKind::Reply,
            JobPayload::Feedback { .. } => JobKind::Feedback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: JobPayload,
    pub status: JobStatus,
    /// Present iff status is `Finished`.
    pub result: Option<serde_json::Value>,
    /// Present iff status is `Failed`; the captured failure text, never
    /// silently discarded.
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: payload.kind(),
            payload,
            status: JobStatus::Queued,
            result: None,
            error: None,
            enqueued_at: Utc::now(),
        }
    }

    /// Terminal state of this record, if it has reached one.
    pub fn outcome(&self) -> Option<JobOutcome> {
        match self.status {
            JobStatus::Finished => Some(JobOutcome::Finished(
                self.result.clone().unwrap_or(serde_json::Value::Null),
            )),
            JobStatus::Failed => Some(JobOutcome::Failed(
                self.error.clone().unwrap_or_else(|| "job failed".to_string()),
            )),
            JobStatus::Queued | JobStatus::Running => None,
        }
    }
}

/// Terminal job state as observed by a waiting handler.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Finished(serde_json::Value),
    Failed(String),
}

/// Result payload stored for a finished reply job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyResult {
    pub reply: String,
}

/// Result payload stored for a finished feedback job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub language_feedback: LanguageFeedback,
}
