//! Trusted time source probed by the logical clock.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::SyncResult;

/// Server time reported by a time source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    /// Milliseconds since the Unix epoch, UTC.
    pub server_time_utc_ms: i64,
}

/// A time source answering one round-trip probe per call.
///
/// Any failure surfaces as a non-improving attempt in the logical clock;
/// implementations should not retry internally.
#[async_trait]
pub trait TimeSource: Send + Sync + fmt::Debug + 'static {
    /// Fetch the current server time.
    async fn server_time(&self) -> SyncResult<ServerTime>;
}
