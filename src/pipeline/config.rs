use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::retry::RetryPolicy;

pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024;

fn default_allowed_mime_types() -> Vec<String> {
    ["text/plain", "application/pdf", "image/png", "image/jpeg"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Settings shared by a pipeline and its built-in stages.
///
/// Missing fields fall back to their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub max_workers: usize,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub max_document_size: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_workers: 5,
            max_retries: 3,
            timeout_ms: 30_000,
            retry_delay_ms: 1_000,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = duration_ms(timeout);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay_ms = duration_ms(retry_delay);
        self
    }

    pub fn max_document_size(mut self, max_document_size: usize) -> Self {
        self.max_document_size = max_document_size;
        self
    }

    pub fn allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than zero"));
        }
        if self.max_workers == 0 {
            return Err(Error::config("max_workers must be greater than zero"));
        }
        if self.max_retries == 0 {
            return Err(Error::config("max_retries must be at least one"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
            .timeout(Duration::from_millis(self.timeout_ms))
            .retry_delay(Duration::from_millis(self.retry_delay_ms))
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
