//! Resilience configuration with builder pattern
//!
//! Bundles the retry schedules, request time limits and upload concurrency
//! used by one import job, with sane defaults.

use super::retry::RetryConfig;
use super::timeout::TimeoutConfig;
use std::time::Duration;

/// Global resilience configuration for storage API calls
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub concurrency: ConcurrencyConfig,
}

/// Concurrency limiting configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyConfig {
    /// Maximum documents uploaded at once within a single group
    pub max_concurrent_uploads: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 3,
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Same attempt counts as the default, but no waiting between attempts
    /// and no request time limits (tests and dry runs)
    pub fn immediate() -> Self {
        Self {
            retry: RetryConfig::immediate(),
            timeouts: TimeoutConfig {
                read: Duration::ZERO,
                write: Duration::ZERO,
                upload: Duration::ZERO,
            },
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Base delay for the linear retry schedules
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn fetch_versions_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.fetch_versions_attempts = attempts;
        self
    }

    pub fn verify_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.verify_attempts = attempts;
        self
    }

    /// Delays between course verification attempts
    pub fn verify_schedule(mut self, schedule: Vec<Duration>) -> Self {
        self.config.retry.verify_schedule = schedule;
        self
    }

    pub fn persist_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.persist_attempts = attempts;
        self
    }

    /// Time limit for lookups, course reads and creates
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.read = timeout;
        self
    }

    /// Time limit for version-list writes
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.write = timeout;
        self
    }

    /// Time limit for uploads and downloads
    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.upload = timeout;
        self
    }

    /// Set max concurrent uploads per group
    pub fn max_concurrent_uploads(mut self, max: usize) -> Self {
        self.config.concurrency.max_concurrent_uploads = max.max(1);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
