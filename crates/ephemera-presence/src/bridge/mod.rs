//! Bridges between the presence engine and its collaborators: the event
//! transport, role lookup, and the stamped send path.

pub mod memory;
pub mod roles;
pub mod scope;

pub use memory::{MemoryHub, MemoryTransport};
pub use roles::StaticRoleVerifier;
pub use scope::EventScope;
