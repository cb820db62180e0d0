//! Application configuration
//!
//! Loaded from a TOML file (explicit `--config`, else
//! `<config dir>/supply-import/config.toml` when present, else defaults),
//! then overridden by `SUPPLY_IMPORT_*` environment variables. `.env` files
//! are honoured through dotenvy.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::resilience::{ResilienceConfig, RetryConfig};

const APP_DIR: &str = "supply-import";
const CONFIG_FILE: &str = "config.toml";

/// Storage API connection settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            read_timeout_secs: 30,
            write_timeout_secs: 60,
            upload_timeout_secs: 120,
        }
    }
}

/// Retry schedule settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub base_delay_ms: u64,
    pub fetch_versions_attempts: u32,
    pub verify_attempts: u32,
    pub verify_schedule_secs: Vec<u64>,
    pub persist_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            fetch_versions_attempts: 3,
            verify_attempts: 5,
            verify_schedule_secs: vec![1, 2, 3, 5],
            persist_attempts: 3,
        }
    }
}

/// Import job settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Documents uploaded at once within one group
    pub upload_concurrency: usize,
    /// Download the list URLs given in the spreadsheet when a group has no
    /// matched PDF
    pub download_source_urls: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            upload_concurrency: 3,
            download_source_urls: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetrySettings,
    pub import: ImportSettings,
}

impl Config {
    /// Default location of the config file, if a config dir exists
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from `path` (or the default location) and apply
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => {
                    log::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid configuration")
    }

    /// Apply `SUPPLY_IMPORT_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SUPPLY_IMPORT_API_URL") {
            self.api.base_url = url;
        }
        if let Some(token) = lookup("SUPPLY_IMPORT_API_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(value) = lookup("SUPPLY_IMPORT_UPLOAD_CONCURRENCY") {
            self.import.upload_concurrency = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid SUPPLY_IMPORT_UPLOAD_CONCURRENCY: {}", value))?;
        }
        Ok(())
    }

    /// Resilience settings derived from this configuration
    pub fn resilience(&self) -> ResilienceConfig {
        let retry = RetryConfig {
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            fetch_versions_attempts: self.retry.fetch_versions_attempts,
            verify_attempts: self.retry.verify_attempts,
            verify_schedule: self
                .retry
                .verify_schedule_secs
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            persist_attempts: self.retry.persist_attempts,
        };

        ResilienceConfig::builder()
            .retry_config(retry)
            .read_timeout(Duration::from_secs(self.api.read_timeout_secs))
            .write_timeout(Duration::from_secs(self.api.write_timeout_secs))
            .upload_timeout(Duration::from_secs(self.api.upload_timeout_secs))
            .max_concurrent_uploads(self.import.upload_concurrency)
            .build()
    }
}
