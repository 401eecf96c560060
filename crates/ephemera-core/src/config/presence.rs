//! Presence roster configuration.

use serde::{Deserialize, Serialize};

use crate::types::Role;

/// Presence roster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Milliseconds of silence after which a peer is reported offline.
    #[serde(default = "default_expiration_period")]
    pub expiration_period_ms: i64,
    /// Event name presence records are broadcast under.
    #[serde(default = "default_event_name")]
    pub event_name: String,
    /// Roles allowed to broadcast local presence. Empty means unrestricted.
    #[serde(default)]
    pub allowed_roles: Vec<Role>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            expiration_period_ms: default_expiration_period(),
            event_name: default_event_name(),
            allowed_roles: Vec::new(),
        }
    }
}

fn default_expiration_period() -> i64 {
    20_000
}

fn default_event_name() -> String {
    "updatePresence".to_string()
}
