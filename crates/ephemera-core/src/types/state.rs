//! Presence state definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// User presence state as broadcast on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    /// User is connected and active.
    #[default]
    Online,
    /// User is connected but has stepped away.
    Away,
    /// User is gone, either by choice or because their record expired.
    Offline,
}

impl PresenceState {
    /// Converts to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceState {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "offline" => Ok(Self::Offline),
            _ => Err(SyncError::validation(format!(
                "Invalid presence state: '{s}'. Expected one of: online, away, offline"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("online".parse::<PresenceState>().unwrap(), PresenceState::Online);
        assert_eq!("AWAY".parse::<PresenceState>().unwrap(), PresenceState::Away);
        assert!("dnd".parse::<PresenceState>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&PresenceState::Offline).unwrap();
        assert_eq!(json, "\"offline\"");
    }
}
