//! Change notifications emitted by the roster.

use serde::{Deserialize, Serialize};

use super::user::PresenceUser;

/// Who authored an accepted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// This client: an optimistic local update or its own broadcast.
    Local,
    /// A peer.
    Remote,
}

impl ChangeOrigin {
    /// Map the merge's `is_local` flag.
    pub fn from_local(is_local: bool) -> Self {
        if is_local { Self::Local } else { Self::Remote }
    }
}

/// An accepted roster change.
#[derive(Debug, Clone)]
pub struct PresenceChange {
    /// The user after the change.
    pub user: PresenceUser,
    /// Whether the change came from this client or a peer.
    pub origin: ChangeOrigin,
    /// Whether this was the first record seen for the user.
    pub is_new_user: bool,
}
