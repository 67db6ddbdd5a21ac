//! Engine configuration

use crate::error::{Error, Result};
use crate::memory::pool::{DEFAULT_POOL_CAPACITY, MAX_POOL_CAPACITY};
use std::time::Duration;

/// Environment variable overriding [`EngineConfig::pool_capacity`]
pub const ENV_POOL_CAPACITY: &str = "SHERLOG_POOL_CAPACITY";

/// Environment variable overriding [`EngineConfig::idle_sleep`], in microseconds
pub const ENV_IDLE_SLEEP_US: &str = "SHERLOG_IDLE_SLEEP_US";

/// Environment variable overriding [`EngineConfig::drain_on_shutdown`]
pub const ENV_DRAIN_ON_SHUTDOWN: &str = "SHERLOG_DRAIN_ON_SHUTDOWN";

/// Configuration for an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of record slots, allocated once
    pub pool_capacity: usize,
    /// How long the consumer sleeps when the queue is empty
    pub idle_sleep: Duration,
    /// Deliver queued events at shutdown instead of discarding them
    pub drain_on_shutdown: bool,
    /// Name of the consumer thread
    pub worker_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            idle_sleep: Duration::from_micros(50),
            drain_on_shutdown: true,
            worker_name: "sherlog-worker".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `SHERLOG_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides produced by `lookup` on top of `self`
    ///
    /// `lookup` is asked for each `SHERLOG_*` key and returns its raw value,
    /// if set.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_POOL_CAPACITY) {
            let capacity = parse_number(ENV_POOL_CAPACITY, &value)?;
            if capacity as u128 > MAX_POOL_CAPACITY as u128 {
                return Err(invalid(ENV_POOL_CAPACITY, value));
            }
            self.pool_capacity = capacity as usize;
        }

        if let Some(value) = lookup(ENV_IDLE_SLEEP_US) {
            self.idle_sleep = Duration::from_micros(parse_number(ENV_IDLE_SLEEP_US, &value)?);
        }

        if let Some(value) = lookup(ENV_DRAIN_ON_SHUTDOWN) {
            self.drain_on_shutdown = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid(ENV_DRAIN_ON_SHUTDOWN, value)),
            };
        }

        Ok(self)
    }

    /// Check values that cannot be expressed through the type system
    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity > MAX_POOL_CAPACITY {
            return Err(invalid("pool_capacity", self.pool_capacity.to_string()));
        }
        if self.worker_name.contains('\0') {
            return Err(invalid("worker_name", self.worker_name.clone()));
        }
        Ok(())
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| invalid(key, value.to_string()))
}

fn invalid(key: &'static str, value: String) -> Error {
    Error::InvalidConfig { key, value }
}
