// Durable job queue: data model, redis storage, wait protocol, worker pool

pub mod jobs;
pub mod store;
#[cfg(test)]
pub(crate) mod test_support;
pub mod wait;
pub mod workers;

pub use jobs::{JobKind, JobOutcome, JobPayload, JobRecord, JobStatus};
pub use store::JobStore;
pub use workers::spawn_workers;
