//! Broadcast scheduling and inbound dispatch.

pub mod handler;
pub mod scheduler;

pub use handler::SyncHandler;
pub use scheduler::SyncScheduler;
