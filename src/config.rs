use crate::types::SamplingParams;
use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub generation: GenerationConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub url: String,
    pub name: String,
    /// How long finished/failed job records stay observable before redis
    /// expires them.
    pub result_ttl_secs: u64,
    /// Budget a request handler spends waiting for its job to resolve.
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// OpenAI-compatible chat-completions endpoint of the local model server.
    pub endpoint: String,
    pub model: String,
    /// Maximum concurrent generation calls per process. 1 for a single-GPU
    /// model.
    pub concurrency: usize,
    pub reply: SamplingParams,
    pub feedback: SamplingParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_turns: usize,
    pub max_history_chars: usize,
    pub max_message_chars: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
            },
            queue: QueueConfig {
                url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                name: env::var("QUEUE_NAME").unwrap_or_else(|_| "tutor_jobs".to_string()),
                result_ttl_secs: env::var("RESULT_TTL_S")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()?,
                wait_timeout_secs: env::var("JOB_WAIT_TIMEOUT_S")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()?,
                poll_interval_ms: env::var("JOB_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()?,
                workers: env::var("QUEUE_WORKERS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()?,
            },
            generation: GenerationConfig {
                endpoint: env::var("GENERATION_URL").unwrap_or_else(|_| {
                    "http://localhost:8080/v1/chat/completions".to_string()
                }),
                model: env::var("MODEL_ID")
                    .unwrap_or_else(|_| "Qwen/Qwen2.5-7B-Instruct".to_string()),
                concurrency: env::var("GENERATION_CONCURRENCY")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
                reply: SamplingParams {
                    max_new_tokens: env::var("MAX_NEW_TOKENS_REPLY")
                        .unwrap_or_else(|_| "192".to_string())
                        .parse()?,
                    temperature: env::var("TEMPERATURE_REPLY")
                        .unwrap_or_else(|_| "0.6".to_string())
                        .parse()?,
                    top_p: env::var("TOP_P")
                        .unwrap_or_else(|_| "0.9".to_string())
                        .parse()?,
                },
                feedback: SamplingParams {
                    max_new_tokens: env::var("MAX_NEW_TOKENS_FEEDBACK")
                        .unwrap_or_else(|_| "256".to_string())
                        .parse()?,
                    temperature: env::var("TEMPERATURE_FEEDBACK")
                        .unwrap_or_else(|_| "0.3".to_string())
                        .parse()?,
                    top_p: env::var("TOP_P")
                        .unwrap_or_else(|_| "0.9".to_string())
                        .parse()?,
                },
            },
            limits: LimitsConfig {
                max_turns: env::var("MAX_HISTORY_TURNS")
                    .unwrap_or_else(|_| "16".to_string())
                    .parse()?,
                max_history_chars: env::var("MAX_HISTORY_CHARS")
                    .unwrap_or_else(|_| "6000".to_string())
                    .parse()?,
                max_message_chars: env::var("MAX_MESSAGE_CHARS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()?,
            },
        })
    }
}
