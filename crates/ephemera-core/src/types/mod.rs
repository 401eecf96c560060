//! Shared types: identifiers, wire records, presence states, and roles.

pub mod id;
pub mod record;
pub mod role;
pub mod state;

pub use id::{OriginId, UserId};
pub use record::{PresenceRecord, PresenceUpdate, RawRecord, Timestamped, TimestampedRecord};
pub use role::Role;
pub use state::PresenceState;
