//! # ephemera-presence
//!
//! Eventual-consistency primitives for session-scoped presence. Provides:
//!
//! - A logical clock that estimates a shared "now" from round-trip probes
//! - The deterministic ordering rule deciding which of two records wins
//! - A presence roster merging per-user records with lazy expiry
//! - A sync scheduler broadcasting local state and dispatching peer state
//! - An in-memory transport and time source for simulations

pub mod bridge;
pub mod clock;
pub mod metrics;
pub mod ordering;
pub mod presence;
pub mod session;
pub mod sync;

pub use bridge::memory::{MemoryHub, MemoryTransport};
pub use bridge::roles::StaticRoleVerifier;
pub use bridge::scope::EventScope;
pub use clock::logical::LogicalClock;
pub use clock::source::{LocalTimeSource, ManualTimeSource, ScriptedProbe};
pub use metrics::PresenceMetrics;
pub use ordering::is_newer;
pub use presence::change::{ChangeOrigin, PresenceChange};
pub use presence::roster::PresenceRoster;
pub use presence::tracker::PresenceTracker;
pub use presence::user::PresenceUser;
pub use session::{PresenceSession, SessionContext};
pub use sync::handler::SyncHandler;
pub use sync::scheduler::SyncScheduler;
