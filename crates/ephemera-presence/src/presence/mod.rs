//! User presence tracking.

pub mod change;
pub mod roster;
pub mod tracker;
pub mod user;

pub use change::{ChangeOrigin, PresenceChange};
pub use roster::PresenceRoster;
pub use tracker::PresenceTracker;
pub use user::PresenceUser;
