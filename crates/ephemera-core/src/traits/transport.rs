//! Event transport delivering serialized records to every session member.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::result::SyncResult;
use crate::types::{OriginId, RawRecord};

/// Connection status reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; sends fail with a not-connected error.
    Disconnected,
    /// Connected and able to send.
    Connected,
}

/// A record surfaced by the transport.
#[derive(Debug, Clone)]
pub struct InboundRecord {
    /// The record as the sender transmitted it.
    pub record: RawRecord,
    /// Whether this is the loop-back of a record this client sent.
    pub is_local: bool,
}

/// Delivers records to all session members (including the sender) and
/// reports connect/disconnect transitions.
///
/// Delivery is at-most-once; retries, if any, are the transport's concern.
#[async_trait]
pub trait EventTransport: Send + Sync + fmt::Debug + 'static {
    /// Send a record, returning it with the origin id filled in.
    async fn send(&self, record: RawRecord) -> SyncResult<RawRecord>;

    /// Subscribe to inbound records, including local echoes.
    fn subscribe(&self) -> broadcast::Receiver<InboundRecord>;

    /// The current connection id, `None` while disconnected.
    fn connection_id(&self) -> Option<OriginId>;

    /// Watch connect/disconnect transitions.
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool {
        *self.connection_state().borrow() == ConnectionState::Connected
    }
}
