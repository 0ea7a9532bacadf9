//! Worker pool
//!
//! Workers block-pop job ids from the pending list and run each job to
//! completion: trim the context (reply jobs), acquire a throttle permit,
//! call the generation backend, and for feedback jobs run the structured
//! output recovery chain. Exactly one worker mutates a given job. There is
//! no mid-generation cancellation; a job whose waiter has already timed out
//! still finishes, and its result simply ages out of retention unobserved.

use crate::config::{GenerationConfig, LimitsConfig};
use crate::feedback::{fallback_language_feedback, safe_parse_language_feedback};
use crate::generation::{TextGenerator, Throttle};
use crate::history;
use crate::prompts::{self, PromptKind};
use crate::queue::jobs::{FeedbackResult, JobPayload, JobRecord, ReplyResult};
use crate::queue::store::JobStore;
use crate::types::{AppResult, ChatTurn, GenerationRequest, Level};
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long one BLPOP call blocks before the loop re-arms.
const POP_BLOCK_SECS: f64 = 5.0;

const FEEDBACK_FALLBACK_REASON: &str = "Feedback temporarily unavailable (formatting error).";

pub struct Worker {
    store: Arc<JobStore>,
    generator: Arc<dyn TextGenerator>,
    throttle: Throttle,
    generation: GenerationConfig,
    limits: LimitsConfig,
}

impl Worker {
    pub fn new(
        store: Arc<JobStore>,
        generator: Arc<dyn TextGenerator>,
        throttle: Throttle,
        generation: GenerationConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            store,
            generator,
            throttle,
            generation,
            limits,
        }
    }

    /// Dequeue loop; runs until the process exits. Blocking pops go over a
    /// connection owned by this worker so they cannot stall record traffic.
    pub async fn run(self) {
        let mut pop_conn = self.connect_pop().await;
        loop {
            match self.store.pop_next(&mut pop_conn, POP_BLOCK_SECS).await {
                Ok(Some(job_id)) => match self.store.load(job_id).await {
                    Ok(Some(record)) => self.process(record).await,
                    Ok(None) => {
                        warn!(job_id = %job_id, "dequeued job record already expired");
                    }
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "failed to load dequeued job");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "queue pop failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    pop_conn = self.connect_pop().await;
                }
            }
        }
    }

    /// Retry until the dedicated pop connection is up. A worker without one
    /// cannot do anything useful, so blocking here is fine.
    async fn connect_pop(&self) -> MultiplexedConnection {
        loop {
            match self.store.pop_connection().await {
                Ok(conn) => return conn,
                Err(e) => {
                    error!(error = %e, "pop connection failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    pub(crate) async fn process(&self, record: JobRecord) {
        let job_id = record.id;
        info!(job_id = %job_id, kind = %record.kind, "job started");

        if let Err(e) = self.store.mark_running(job_id).await {
            error!(job_id = %job_id, error = %e, "failed to mark job running");
            // The id is already off the pending list; leave a terminal state
            // so the waiter resolves instead of burning its whole timeout.
            if let Err(e) = self
                .store
                .fail(job_id, format!("worker could not start job: {e}"))
                .await
            {
                error!(job_id = %job_id, error = %e, "failed to record start failure");
            }
            return;
        }

        let outcome = match record.payload {
            JobPayload::Reply {
                level,
                history,
                message,
            } => {
                run_reply_job(
                    self.generator.as_ref(),
                    &self.throttle,
                    &self.generation,
                    &self.limits,
                    level.as_deref(),
                    &history,
                    &message,
                )
                .await
            }
            JobPayload::Feedback { level, message } => {
                run_feedback_job(
                    self.generator.as_ref(),
                    &self.throttle,
                    &self.generation,
                    &self.limits,
                    level.as_deref(),
                    &message,
                )
                .await
            }
        };

        let stored = match outcome {
            Ok(result) => {
                info!(job_id = %job_id, "job finished");
                self.store.complete(job_id, result).await
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "job execution failed");
                self.store.fail(job_id, e.to_string()).await
            }
        };

        if let Err(e) = stored {
            error!(job_id = %job_id, error = %e, "failed to store job outcome");
        }
    }
}

/// Reply pipeline: trim history and message, then one throttled generation
/// call.
pub(crate) async fn run_reply_job(
    generator: &dyn TextGenerator,
    throttle: &Throttle,
    generation: &GenerationConfig,
    limits: &LimitsConfig,
    level: Option<&str>,
    history: &[ChatTurn],
    message: &str,
) -> AppResult<serde_json::Value> {
    let level = Level::resolve(level);
    let trimmed = history::trim(history, limits.max_turns, limits.max_history_chars);
    info!(
        level = %level,
        turns_in = history.len(),
        turns_kept = trimmed.len(),
        msg_len = message.chars().count(),
        "running reply job"
    );

    let request = GenerationRequest {
        system_prompt: prompts::system_prompt(level, PromptKind::Reply),
        history: trimmed,
        user_message: history::trim_text(message, limits.max_message_chars),
        params: generation.reply.clone(),
    };

    let reply = throttle.run(generator.generate(&request)).await?;
    info!(reply_len = reply.chars().count(), "reply generated");

    Ok(serde_json::to_value(ReplyResult { reply })?)
}

/// Feedback pipeline: one throttled generation call, then the structured
/// output recovery chain. Malformed model output is never an error here;
/// the fallback object keeps the response contract satisfiable.
pub(crate) async fn run_feedback_job(
    generator: &dyn TextGenerator,
    throttle: &Throttle,
    generation: &GenerationConfig,
    limits: &LimitsConfig,
    level: Option<&str>,
    message: &str,
) -> AppResult<serde_json::Value> {
    let level = Level::resolve(level);
    info!(level = %level, msg_len = message.chars().count(), "running feedback job");

    let request = GenerationRequest {
        system_prompt: prompts::system_prompt(level, PromptKind::Feedback),
        history: Vec::new(),
        user_message: history::trim_text(message, limits.max_message_chars),
        params: generation.feedback.clone(),
    };

    let raw = throttle.run(generator.generate(&request)).await?;

    let language_feedback = match safe_parse_language_feedback(&raw) {
        Some(parsed) => {
            info!(items = parsed.items.len(), "feedback parsed");
            parsed
        }
        None => {
            warn!("feedback parse failed, using fallback");
            fallback_language_feedback(FEEDBACK_FALLBACK_REASON)
        }
    };

    Ok(serde_json::to_value(FeedbackResult { language_feedback })?)
}

/// Launch `count` workers on the runtime. Each worker owns a clone of the
/// shared store, generator and throttle; the throttle is what keeps the
/// model safe no matter how many workers run.
pub fn spawn_workers(
    count: usize,
    store: Arc<JobStore>,
    generator: Arc<dyn TextGenerator>,
    throttle: Throttle,
    generation: GenerationConfig,
    limits: LimitsConfig,
) {
    for index in 0..count {
        let worker = Worker::new(
            store.clone(),
            generator.clone(),
            throttle.clone(),
            generation.clone(),
            limits.clone(),
        );
        info!(worker = index, "spawning queue worker");
        tokio::spawn(worker.run());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::queue::test_support::{spawn_stub, StubOptions};
    use crate::types::{AppError, SamplingParams};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingGenerator {
        response: String,
        last_request: Mutex<Option<GenerationRequest>>,
    }

    impl RecordingGenerator {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                last_request: Mutex::new(None),
            }
        }

        fn last_request(&self) -> GenerationRequest {
            self.last_request.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> AppResult<String> {
            *self.last_request.lock().unwrap() = Some(request.clone());
            Ok(self.response.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> AppResult<String> {
            Err(AppError::Generation("backend down".to_string()))
        }
    }

    fn generation_config() -> GenerationConfig {
        GenerationConfig {
            endpoint: "http://unused".to_string(),
            model: "test-model".to_string(),
            concurrency: 1,
            reply: SamplingParams {
                max_new_tokens: 192,
                temperature: 0.6,
                top_p: 0.9,
            },
            feedback: SamplingParams {
                max_new_tokens: 256,
                temperature: 0.3,
                top_p: 0.9,
            },
        }
    }

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_turns: 16,
            max_history_chars: 6000,
            max_message_chars: 2000,
        }
    }

    fn long_history(turns: usize) -> Vec<ChatTurn> {
        (0..turns)
            .map(|i| {
                if i % 2 == 0 {
                    ChatTurn::user(format!("user turn {i}"))
                } else {
                    ChatTurn::assistant(format!("assistant turn {i}"))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_reply_job_trims_history_before_generation() {
        let generator = RecordingGenerator::new("Nice to meet you!");
        let throttle = Throttle::new(1);
        let history = long_history(20);

        let value = run_reply_job(
            &generator,
            &throttle,
            &generation_config(),
            &limits(),
            Some("B1"),
            &history,
            "hello",
        )
        .await
        .unwrap();

        assert_eq!(value["reply"], "Nice to meet you!");

        let seen = generator.last_request();
        assert_eq!(seen.history.len(), 16);
        // most recent turns survive
        assert_eq!(seen.history[15].content, "assistant turn 19");
        assert_eq!(seen.history[0].content, "user turn 4");
        assert_eq!(seen.params.max_new_tokens, 192);
        assert!(seen.system_prompt.contains("LANGUAGE LEVEL: B1"));
    }

    #[tokio::test]
    async fn test_reply_job_bounds_user_message() {
        let generator = RecordingGenerator::new("ok");
        let throttle = Throttle::new(1);
        let mut tight = limits();
        tight.max_message_chars = 5;

        run_reply_job(
            &generator,
            &throttle,
            &generation_config(),
            &tight,
            None,
            &[],
            "hello world",
        )
        .await
        .unwrap();

        assert_eq!(generator.last_request().user_message, "hello...");
    }

    #[tokio::test]
    async fn test_feedback_job_parses_prose_wrapped_output() {
        let generator = RecordingGenerator::new(
            "Sure! {\"language_feedback\":{\"items\":[],\"overall_comment\":\"No mistakes — great job!\"}}",
        );
        let throttle = Throttle::new(1);

        let value = run_feedback_job(
            &generator,
            &throttle,
            &generation_config(),
            &limits(),
            Some("a2"),
            "I am fine",
        )
        .await
        .unwrap();

        assert_eq!(
            value["language_feedback"]["overall_comment"],
            "No mistakes — great job!"
        );
        assert_eq!(value["language_feedback"]["items"].as_array().unwrap().len(), 0);

        let seen = generator.last_request();
        assert!(seen.history.is_empty());
        assert_eq!(seen.params.max_new_tokens, 256);
    }

    #[tokio::test]
    async fn test_feedback_job_falls_back_on_garbage_output() {
        let generator = RecordingGenerator::new("I refuse to answer in JSON today.");
        let throttle = Throttle::new(1);

        let value = run_feedback_job(
            &generator,
            &throttle,
            &generation_config(),
            &limits(),
            None,
            "I am fine",
        )
        .await
        .unwrap();

        assert_eq!(
            value["language_feedback"]["overall_comment"],
            FEEDBACK_FALLBACK_REASON
        );
        assert!(value["language_feedback"]["items"].as_array().unwrap().is_empty());
    }

    fn queue_config(url: String) -> QueueConfig {
        QueueConfig {
            url,
            name: "test".to_string(),
            result_ttl_secs: 60,
            wait_timeout_secs: 1,
            poll_interval_ms: 10,
            workers: 0,
        }
    }

    #[tokio::test]
    async fn test_start_failure_still_records_terminal_state() {
        let (url, log) = spawn_stub(StubOptions { fail_get: true }).await;
        let client = redis::Client::open(url.as_str()).unwrap();
        let store = JobStore::connect(client, &queue_config(url)).await.unwrap();

        let worker = Worker::new(
            Arc::new(store),
            Arc::new(RecordingGenerator::new("unused")),
            Throttle::new(1),
            generation_config(),
            limits(),
        );

        let record = JobRecord::new(JobPayload::Feedback {
            level: None,
            message: "I am fine".to_string(),
        });
        worker.process(record).await;

        // mark_running reads the record and errors; the worker must then try
        // to fail the job, which reads the record again.
        let gets = log
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == "GET")
            .count();
        assert!(gets >= 2, "expected a fail attempt after the start error, saw {gets} GETs");
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let throttle = Throttle::new(1);

        let error = run_reply_job(
            &FailingGenerator,
            &throttle,
            &generation_config(),
            &limits(),
            None,
            &[],
            "hi",
        )
        .await
        .unwrap_err();

        assert!(matches!(error, AppError::Generation(_)));
    }
}
