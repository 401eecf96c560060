//! Logical clock: round-trip sampling against a time source and
//! monotonic timestamp issuance.

pub(crate) mod estimate;
pub mod logical;
pub mod source;

pub use logical::LogicalClock;
