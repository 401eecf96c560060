//! The callbacks a [`SyncScheduler`](super::SyncScheduler) drives.

use async_trait::async_trait;

use ephemera_core::result::SyncResult;
use ephemera_core::traits::InboundRecord;
use ephemera_core::types::RawRecord;

/// Owner of some replicated state: produces the local copy for broadcast
/// and merges copies received from peers.
#[async_trait]
pub trait SyncHandler: Send + Sync + 'static {
    /// Event name this handler's records travel under.
    fn event_name(&self) -> &str;

    /// Freshly stamped local state to broadcast, or `None` if there is
    /// nothing to send yet.
    async fn local_state(&self) -> SyncResult<Option<RawRecord>>;

    /// Merge a received record.
    ///
    /// Returning `true` asks the scheduler to broadcast local state right
    /// away, e.g. so a newly seen peer learns about us without waiting for
    /// the next tick.
    async fn apply_remote(&self, inbound: InboundRecord) -> SyncResult<bool>;
}
