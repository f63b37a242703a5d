//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! Durations are given in milliseconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

fn default_namespace() -> String {
    "versus-board-v1-".to_string()
}

fn default_bootstrap_timeout_ms() -> u64 {
    15_000
}

fn default_attempt_timeout_ms() -> u64 {
    5_000
}

fn default_dial_attempts() -> u32 {
    3
}

fn default_reconnect_attempts() -> u32 {
    2
}

fn default_backoff_initial_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    8_000
}

fn default_heartbeat_ms() -> u64 {
    5_000
}

fn default_idle_timeout_ms() -> u64 {
    15_000
}

/// Timeouts, retry budgets and naming for the peer transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// Prefix put in front of every room identifier
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Upper bound on claiming a room as host.
    #[serde(default = "default_bootstrap_timeout_ms")]
    pub bootstrap_timeout_ms: u64,

    /// Upper bound on a single dial attempt.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Dial attempts before a join gives up.
    #[serde(default = "default_dial_attempts")]
    pub dial_attempts: u32,

    /// Dial attempts after an established link drops.
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Interval between guest keepalive pings.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    /// Silence after which the host declares the link dropped.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            bootstrap_timeout_ms: default_bootstrap_timeout_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            dial_attempts: default_dial_attempts(),
            reconnect_attempts: default_reconnect_attempts(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            heartbeat_ms: default_heartbeat_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl TransportConfig {
    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Delay before retry number `attempt` (1-based): the initial backoff
    /// doubled per earlier retry, capped at the maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .backoff_initial_ms
            .saturating_mul(factor)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dial_attempts == 0 {
            return Err(ConfigError::Invalid("dialAttempts must be at least 1"));
        }
        if self.attempt_timeout_ms == 0 || self.bootstrap_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero"));
        }
        if self.heartbeat_ms == 0 {
            return Err(ConfigError::Invalid("heartbeatMs must be non-zero"));
        }
        if self.idle_timeout_ms <= self.heartbeat_ms {
            return Err(ConfigError::Invalid(
                "idleTimeoutMs must exceed heartbeatMs",
            ));
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(ConfigError::Invalid(
                "backoffMaxMs must not be below backoffInitialMs",
            ));
        }
        Ok(())
    }
}

/// Session-level knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Seed for color assignment; entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.transport.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        info!(path = %path.display(), namespace = %config.transport.namespace, "Config loaded");
        Ok(config)
    }
}
