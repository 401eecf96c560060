//! Convenience result type alias for Ephemera.

use crate::error::SyncError;

/// A specialized `Result` type for Ephemera operations.
pub type SyncResult<T> = Result<T, SyncError>;
