//! Session role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// Roles a connection can hold within a collaboration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Session owner.
    Organizer,
    /// Currently presenting.
    Presenter,
    /// Regular participant.
    Attendee,
    /// Unauthenticated participant.
    Guest,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organizer => "organizer",
            Self::Presenter => "presenter",
            Self::Attendee => "attendee",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "organizer" => Ok(Self::Organizer),
            "presenter" => Ok(Self::Presenter),
            "attendee" => Ok(Self::Attendee),
            "guest" => Ok(Self::Guest),
            _ => Err(SyncError::validation(format!(
                "Invalid role: '{s}'. Expected one of: organizer, presenter, attendee, guest"
            ))),
        }
    }
}
