//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::backoff::ExponentialJitter;

/// Default number of job workers.
pub const DEFAULT_WORKERS: usize = 4;
/// Default job buffer capacity.
pub const DEFAULT_QUEUE_SIZE: usize = 64;
/// Default simulated failure rate, in percent.
pub const DEFAULT_ERROR_RATE: u8 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(50),
            max: Duration::from_secs(5),
            jitter: Duration::from_millis(50),
        }
    }
}

impl BackoffConfig {
    pub fn policy(&self) -> ExponentialJitter {
        ExponentialJitter::new(self.base, self.max, self.jitter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub workers: usize,
    pub queue_size: usize,
    /// 0..=100, share of simulated processing attempts that fail.
    pub error_rate: u8,
    pub backoff: BackoffConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            error_rate: DEFAULT_ERROR_RATE,
            backoff: BackoffConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKERS` | `4` | Concurrent job workers (min 1) |
    /// | `QUEUE_SIZE` | `64` | Job buffer capacity |
    /// | `ERROR_RATE` | `20` | Simulated failure percentage (clamped to 100) |
    /// | `BACKOFF_BASE_MS` | `50` | First retry delay |
    /// | `BACKOFF_MAX_MS` | `5000` | Retry delay cap |
    /// | `BACKOFF_JITTER_MS` | `50` | Jitter window width |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup. Unset or malformed values fall back
    /// to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(parse_or(&lookup, key, default.as_millis() as u64))
        };

        Self {
            workers: parse_or(&lookup, "WORKERS", defaults.workers).max(1),
            queue_size: parse_or(&lookup, "QUEUE_SIZE", defaults.queue_size),
            error_rate: parse_or(&lookup, "ERROR_RATE", defaults.error_rate).min(100),
            backoff: BackoffConfig {
                base: millis("BACKOFF_BASE_MS", defaults.backoff.base),
                max: millis("BACKOFF_MAX_MS", defaults.backoff.max),
                jitter: millis("BACKOFF_JITTER_MS", defaults.backoff.jitter),
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) if raw.trim().is_empty() => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid config value, using default");
            default
        }),
    }
}
