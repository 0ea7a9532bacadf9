//! Generation throttle
//!
//! The loaded model is a singleton, memory-bound resource; unbounded
//! concurrent calls into it risk exhaustion or crashes. This semaphore is
//! the single chokepoint bounding simultaneous generation calls per process,
//! regardless of how many jobs the worker pool dispatches in parallel.
//! Permit acquisition order is unspecified; liveness is guaranteed as long
//! as guarded futures terminate.

use crate::types::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct Throttle {
    permits: Arc<Semaphore>,
}

impl Throttle {
    /// `concurrency` is the exact number of permits; commonly 1 for a
    /// single-GPU model.
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
        }
    }

    /// Acquire a permit, await the future, release the permit when the
    /// future completes or errors.
    pub async fn run<F, T>(&self, future: F) -> AppResult<T>
    where
        F: std::future::Future<Output = AppResult<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::Internal("generation throttle closed".to_string()))?;
        future.await
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
