//! Traits describing the collaborators Ephemera depends on.
//!
//! Concrete implementations are injected into each component's
//! constructor; nothing here is a process-wide singleton.

pub mod clock;
pub mod role_verifier;
pub mod time_source;
pub mod transport;

pub use clock::{LocalClock, ManualClock, SystemClock};
pub use role_verifier::RoleVerifier;
pub use time_source::{ServerTime, TimeSource};
pub use transport::{ConnectionState, EventTransport, InboundRecord};
