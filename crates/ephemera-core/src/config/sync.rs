//! Sync scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Periodic broadcast settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Interval between re-broadcasts of local state in milliseconds.
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
    /// How long a restricted broadcast waits for a connection. `0` waits forever.
    #[serde(default)]
    pub connect_wait_timeout_ms: u64,
}

impl SyncConfig {
    /// Re-broadcast interval as a [`Duration`].
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Connection wait bound, `None` when unbounded.
    pub fn connect_wait_timeout(&self) -> Option<Duration> {
        (self.connect_wait_timeout_ms > 0)
            .then(|| Duration::from_millis(self.connect_wait_timeout_ms))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval(),
            connect_wait_timeout_ms: 0,
        }
    }
}

fn default_update_interval() -> u64 {
    15_000
}
