//! # ephemera-core
//!
//! Core crate for Ephemera. Contains the error taxonomy, configuration
//! schemas, typed identifiers, wire record types, roles, and the traits
//! describing the external collaborators (time source, local clock,
//! event transport, role verifier).
//!
//! This crate has **no** internal dependencies on other Ephemera crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::SyncError;
pub use result::SyncResult;
