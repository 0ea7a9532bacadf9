//! Redis-backed job storage
//!
//! One JSON record per job under `{queue}:job:{id}`, plus a pending list
//! `{queue}:pending` that workers block-pop from. Every write refreshes the
//! record TTL, so finished and failed results stay observable for the
//! configured retention period and are garbage-collected by redis
//! afterwards. Single-key GET/SET gives a waiting handler read-your-writes
//! visibility of worker status updates within one poll interval.
//!
//! Record operations share one multiplexed connection; blocking pops must
//! not. Redis parks the whole connection server-side while a BLPOP waits,
//! so a pop sharing the record connection would stall every SET/GET/RPUSH
//! pipelined behind it, including the RPUSH that would satisfy the pop.
//! Each worker therefore pops on its own dedicated connection.

use crate::config::QueueConfig;
use crate::queue::jobs::{JobOutcome, JobPayload, JobRecord, JobStatus};
use crate::queue::wait::wait_for_outcome;
use crate::types::{AppError, AppResult};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Captured error text is bounded so a pathological trace cannot bloat the
/// job record.
const MAX_ERROR_CHARS: usize = 2000;

/// Keep the last `MAX_ERROR_CHARS` characters; the tail of a long trace is
/// where the terminal error line lives.
fn clip_error_tail(error: &str) -> String {
    let total = error.chars().count();
    error
        .chars()
        .skip(total.saturating_sub(MAX_ERROR_CHARS))
        .collect()
}

#[derive(Clone)]
pub struct JobStore {
    client: redis::Client,
    conn: ConnectionManager,
    name: String,
    result_ttl_secs: u64,
}

impl JobStore {
    /// Open the shared multiplexed connection used for record operations.
    pub async fn connect(client: redis::Client, config: &QueueConfig) -> AppResult<Self> {
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            client,
            conn,
            name: config.name.clone(),
            result_ttl_secs: config.result_ttl_secs,
        })
    }

    /// Dedicated connection for blocking pops. Never shared with record
    /// operations; see the module docs.
    pub async fn pop_connection(&self) -> AppResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn job_key(&self, id: Uuid) -> String {
        format!("{}:job:{}", self.name, id)
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.name)
    }

    async fn save(&self, record: &JobRecord) -> AppResult<()> {
        let body = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.job_key(record.id), body, self.result_ttl_secs)
            .await?;
        Ok(())
    }

    /// Create a queued record and push its id onto the pending list.
    /// Returns immediately with the job id.
    pub async fn enqueue(&self, payload: JobPayload) -> AppResult<Uuid> {
        let record = JobRecord::new(payload);
        self.save(&record).await?;

        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(self.pending_key(), record.id.to_string())
            .await?;

        info!(job_id = %record.id, kind = %record.kind, "job enqueued");
        Ok(record.id)
    }

    pub async fn load(&self, id: Uuid) -> AppResult<Option<JobRecord>> {
        let mut conn = self.conn.clone();
        let body: Option<String> = conn.get(self.job_key(id)).await?;
        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Block up to `block_secs` waiting for the next pending job id, on the
    /// caller's dedicated pop connection. Returns `None` on timeout so the
    /// worker loop can re-check and block again.
    pub async fn pop_next(
        &self,
        conn: &mut MultiplexedConnection,
        block_secs: f64,
    ) -> AppResult<Option<Uuid>> {
        let popped: Option<(String, String)> = conn.blpop(self.pending_key(), block_secs).await?;
        match popped {
            Some((_, id)) => Uuid::parse_str(&id)
                .map(Some)
                .map_err(|e| AppError::Internal(format!("malformed job id on queue: {e}"))),
            None => Ok(None),
        }
    }

    pub async fn mark_running(&self, id: Uuid) -> AppResult<()> {
        self.transition(id, JobStatus::Running, None, None).await
    }

    pub async fn complete(&self, id: Uuid, result: serde_json::Value) -> AppResult<()> {
        self.transition(id, JobStatus::Finished, Some(result), None)
            .await
    }

    pub async fn fail(&self, id: Uuid, error: String) -> AppResult<()> {
        self.transition(id, JobStatus::Failed, None, Some(clip_error_tail(&error)))
            .await
    }

    /// Status moves forward only; a write against a terminal or vanished
    /// record is dropped with a warning.
    async fn transition(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> AppResult<()> {
        let Some(mut record) = self.load(id).await? else {
            warn!(job_id = %id, ?status, "job record expired before status update");
            return Ok(());
        };

        if record.status.is_terminal() {
            warn!(
                job_id = %id,
                current = ?record.status,
                attempted = ?status,
                "ignoring status update on terminal job"
            );
            return Ok(());
        }

        record.status = status;
        record.result = result;
        record.error = error;
        self.save(&record).await
    }

    async fn poll_outcome(&self, id: Uuid) -> AppResult<Option<JobOutcome>> {
        match self.load(id).await? {
            Some(record) => Ok(record.outcome()),
            // Retention GC beat the waiter to it; the result is unobservable.
            None => Ok(Some(JobOutcome::Failed(
                "job record no longer exists".to_string(),
            ))),
        }
    }

    /// Block the calling handler (only) until the job resolves or the
    /// timeout budget elapses. See [`wait_for_outcome`] for the contract.
    pub async fn wait(
        &self,
        id: Uuid,
        timeout: Duration,
        interval: Duration,
    ) -> AppResult<serde_json::Value> {
        wait_for_outcome(
            || {
                let store = self.clone();
                async move { store.poll_outcome(id).await }
            },
            timeout,
            interval,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::test_support::{spawn_stub, StubOptions};
    use std::time::Instant;

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

    async fn connect(url: String) -> JobStore {
        let client = redis::Client::open(url.as_str()).unwrap();
        JobStore::connect(client, &queue_config(url)).await.unwrap()
    }

    #[tokio::test]
    async fn test_blocking_pop_keeps_record_ops_responsive() {
        let (url, _log) = spawn_stub(StubOptions::default()).await;
        let store = connect(url).await;

        let popper = store.clone();
        let parked = tokio::spawn(async move {
            let mut conn = popper.pop_connection().await.unwrap();
            popper.pop_next(&mut conn, 1.0).await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // With the pop parked server-side, an enqueue on the record
        // connection must still complete immediately.
        let started = Instant::now();
        store
            .enqueue(JobPayload::Feedback {
                level: None,
                message: "I am fine".to_string(),
            })
            .await
            .unwrap();
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "enqueue stalled behind a blocking pop"
        );

        assert!(matches!(parked.await.unwrap(), Ok(None)));
    }

    #[test]
    fn test_clip_error_tail_keeps_tail() {
        let trace = format!("{}actual panic line", "x".repeat(3000));
        let clipped = clip_error_tail(&trace);
        assert_eq!(clipped.chars().count(), MAX_ERROR_CHARS);
        assert!(clipped.ends_with("actual panic line"));
    }

    #[test]
    fn test_clip_error_tail_short_text_unchanged() {
        assert_eq!(clip_error_tail("backend down"), "backend down");
    }
}
