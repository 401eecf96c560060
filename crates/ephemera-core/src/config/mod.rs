//! Configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field has a default so an empty source is valid.

pub mod clock;
pub mod logging;
pub mod presence;
pub mod sync;

use serde::{Deserialize, Serialize};

pub use self::clock::ClockConfig;
pub use self::logging::LoggingConfig;
pub use self::presence::PresenceConfig;
pub use self::sync::SyncConfig;

use crate::error::SyncError;

/// Root configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay) and `EPHEMERA__*` variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EphemeraConfig {
    /// Logical clock sampling settings.
    #[serde(default)]
    pub clock: ClockConfig,
    /// Presence roster settings.
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Sync scheduler settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EphemeraConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `EPHEMERA__`. Missing files
    /// are skipped.
    pub fn load(env: &str) -> Result<Self, SyncError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("EPHEMERA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SyncError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| SyncError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        tracing::debug!(env, "Configuration loaded");
        Ok(loaded)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, SyncError> {
        let loaded: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values no component can operate with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.clock.sample_interval_ms == 0 {
            return Err(SyncError::configuration(
                "clock.sample_interval_ms must be greater than zero",
            ));
        }
        if self.clock.max_non_improving_attempts == 0 {
            return Err(SyncError::configuration(
                "clock.max_non_improving_attempts must be greater than zero",
            ));
        }
        if self.sync.update_interval_ms == 0 {
            return Err(SyncError::configuration(
                "sync.update_interval_ms must be greater than zero",
            ));
        }
        if self.presence.expiration_period_ms < 0 {
            return Err(SyncError::configuration(
                "presence.expiration_period_ms must not be negative",
            ));
        }
        if self.presence.event_name.is_empty() {
            return Err(SyncError::configuration("presence.event_name must not be empty"));
        }
        Ok(())
    }
}
