//! Logical clock sampling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Controls how the logical clock probes its time source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Delay between consecutive round-trip probes in milliseconds.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,
    /// Consecutive probes without a lower latency before sampling stops.
    #[serde(default = "default_max_non_improving")]
    pub max_non_improving_attempts: u32,
}

impl ClockConfig {
    /// Probe interval as a [`Duration`].
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval(),
            max_non_improving_attempts: default_max_non_improving(),
        }
    }
}

fn default_sample_interval() -> u64 {
    5000
}

fn default_max_non_improving() -> u32 {
    5
}
