//! Sleep schedule between event polls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the poll back-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Interval used after events arrive, and for the first idle poll.
    #[serde(default = "default_base_interval")]
    pub base_interval_ms: u64,
    /// Growth factor applied after each idle poll. `1.0` disables back-off.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound on the interval.
    #[serde(default = "default_max_wait")]
    pub max_wait_ms: u64,
}

fn default_base_interval() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_wait() -> u64 {
    30_000
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: default_base_interval(),
            backoff_factor: default_backoff_factor(),
            max_wait_ms: default_max_wait(),
        }
    }
}

impl BackoffConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base interval.
    #[must_use]
    pub fn with_base_interval_ms(mut self, ms: u64) -> Self {
        self.base_interval_ms = ms;
        self
    }

    /// Sets the growth factor. Values below `1.0` are treated as `1.0`.
    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Sets the upper bound.
    #[must_use]
    pub fn with_max_wait_ms(mut self, ms: u64) -> Self {
        self.max_wait_ms = ms;
        self
    }
}

/// Tracks the current poll interval.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    config: BackoffConfig,
    current_ms: u64,
}

impl PollBackoff {
    /// Starts at the base interval.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        let current_ms = config.base_interval_ms.min(config.max_wait_ms);
        Self { config, current_ms }
    }

    /// The interval to sleep now.
    #[must_use]
    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Events arrived: go back to the base interval.
    pub fn reset(&mut self) {
        self.current_ms = self.config.base_interval_ms.min(self.config.max_wait_ms);
    }

    /// Grows the interval after a sleep.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn advance(&mut self) {
        let factor = self.config.backoff_factor.max(1.0);
        let next = (self.current_ms as f64 * factor).round();
        self.current_ms = if next >= self.config.max_wait_ms as f64 {
            self.config.max_wait_ms
        } else {
            next as u64
        };
    }
}
