// Generation capability and its concurrency guard

pub mod provider;
pub mod throttle;

pub use provider::{HttpGenerator, TextGenerator};
pub use throttle::Throttle;
