//! Production resilience features
//!
//! Provides retry policies, request time limits and upload concurrency
//! settings for storage API interactions.

pub mod config;
pub mod retry;
pub mod timeout;

pub use config::{ConcurrencyConfig, ResilienceConfig, ResilienceConfigBuilder};
pub use retry::{RetryConfig, RetryError, RetryPolicy, RetryableError};
pub use timeout::{TimeoutConfig, with_timeout};
