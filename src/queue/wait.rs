//! Job wait protocol
//!
//! The synchronous-looking half of the pipeline: a handler enqueues a job
//! and then polls its state until a terminal status or a deadline. Polling
//! is deliberate; it keeps the request tier decoupled from worker internals
//! and survives restarts on either side, since the queue storage is the
//! system of record. A timeout leaves nothing dangling handler-side: the job
//! keeps running and its record is eventually expired by the retention
//! policy.

use crate::queue::jobs::JobOutcome;
use crate::types::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll `poll` every `interval` until it reports a terminal outcome or
/// `timeout` elapses. `Finished` resolves to the stored result, `Failed`
/// raises [`AppError::JobFailed`] with the captured error text, and passing
/// the deadline raises [`AppError::JobTimeout`].
pub async fn wait_for_outcome<F, Fut>(
    mut poll: F,
    timeout: Duration,
    interval: Duration,
) -> AppResult<serde_json::Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<Option<JobOutcome>>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match poll().await? {
            Some(JobOutcome::Finished(value)) => return Ok(value),
            Some(JobOutcome::Failed(error)) => return Err(AppError::JobFailed(error)),
            None => {}
        }

        if Instant::now() >= deadline {
            return Err(AppError::JobTimeout);
        }

        tokio::time::sleep(interval).await;
    }
}
