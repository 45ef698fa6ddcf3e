//! Engine configuration with validated, overridable defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};

/// Configuration for one sweep run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Number of concurrent scan workers.
    pub concurrency: usize,
    /// Records accumulated before each durable flush.
    pub batch_size: usize,
    /// Retry behavior for transient evaluation failures.
    pub retry: RetryConfig,
    /// Remote endpoint settings.
    pub rpc: RpcConfig,
}

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per contract call, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per retry.
    pub base_delay_ms: u64,
    /// Uniform jitter fraction in `[0, 1)` applied to each sleep.
    pub jitter: f64,
}

/// JSON-RPC endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Endpoint URL; usually supplied via CLI flag or environment.
    pub url: String,
    /// Per-call timeout so one stuck endpoint cannot pin a worker.
    pub timeout_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            batch_size: 50,
            retry: RetryConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1500,
            jitter: 0.3,
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SweepConfig {
    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: SweepConfig =
            toml::from_str(raw).map_err(|e| SweepError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SweepError::InvalidConfig("concurrency must be >= 1".into()));
        }
        if self.batch_size == 0 {
            return Err(SweepError::InvalidConfig("batch_size must be >= 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SweepError::InvalidConfig(
                "retry.max_attempts must be >= 1".into(),
            ));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(SweepError::InvalidConfig(
                "retry.base_delay_ms must be > 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.retry.jitter) {
            return Err(SweepError::InvalidConfig(
                "retry.jitter must be in [0, 1)".into(),
            ));
        }
        Ok(())
    }
}
