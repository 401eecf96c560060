//! In-memory event transport for single-process sessions.
//!
//! A [`MemoryHub`] plays the role of the relay service: every
//! [`MemoryTransport`] joined to it receives every record sent by any
//! connected member, the sender included (flagged as a local echo).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use ephemera_core::error::SyncError;
use ephemera_core::result::SyncResult;
use ephemera_core::traits::{ConnectionState, EventTransport, InboundRecord};
use ephemera_core::types::{OriginId, RawRecord};

/// Relay connecting in-memory transports.
#[derive(Debug, Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    /// Endpoint number → inbound sender, only while connected
    peers: DashMap<u64, broadcast::Sender<InboundRecord>>,
    next_endpoint: AtomicU64,
    buffer_size: usize,
}

impl MemoryHub {
    /// Create a hub whose endpoints buffer up to `buffer_size` inbound records.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                peers: DashMap::new(),
                next_endpoint: AtomicU64::new(1),
                buffer_size,
            }),
        }
    }

    /// Create a new endpoint and connect it.
    pub fn join(&self) -> MemoryTransport {
        let endpoint = self.inner.next_endpoint.fetch_add(1, Ordering::Relaxed);
        let (inbound, _) = broadcast::channel(self.inner.buffer_size);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let transport = MemoryTransport {
            hub: self.clone(),
            endpoint,
            inbound,
            state,
            connection_id: Mutex::new(None),
            drop_outbound: AtomicBool::new(false),
        };
        transport.connect();
        transport
    }

    /// Number of connected endpoints.
    pub fn connected_count(&self) -> usize {
        self.inner.peers.len()
    }

    fn deliver(&self, sender: u64, record: &RawRecord) {
        for peer in self.inner.peers.iter() {
            let inbound = InboundRecord {
                record: record.clone(),
                is_local: *peer.key() == sender,
            };
            // A peer with no live subscriber just misses the record.
            let _ = peer.value().send(inbound);
        }
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// One client's endpoint on a [`MemoryHub`].
///
/// Each connect assigns a fresh connection id, as a real relay would.
#[derive(Debug)]
pub struct MemoryTransport {
    hub: MemoryHub,
    endpoint: u64,
    inbound: broadcast::Sender<InboundRecord>,
    state: watch::Sender<ConnectionState>,
    connection_id: Mutex<Option<OriginId>>,
    drop_outbound: AtomicBool,
}

impl MemoryTransport {
    /// Connect (or reconnect) under a new connection id.
    pub fn connect(&self) {
        let origin = OriginId::generate();
        *self.connection_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(origin.clone());
        self.hub
            .inner
            .peers
            .insert(self.endpoint, self.inbound.clone());
        self.state.send_replace(ConnectionState::Connected);
        debug!(endpoint = self.endpoint, connection_id = %origin, "Memory transport connected");
    }

    /// Leave the hub; sends fail until [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.hub.inner.peers.remove(&self.endpoint);
        *self.connection_id.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.state.send_replace(ConnectionState::Disconnected);
        debug!(endpoint = self.endpoint, "Memory transport disconnected");
    }

    /// Silently drop outbound records instead of delivering them.
    pub fn set_drop_outbound(&self, drop: bool) {
        self.drop_outbound.store(drop, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    async fn send(&self, record: RawRecord) -> SyncResult<RawRecord> {
        let origin = self
            .connection_id()
            .ok_or_else(|| SyncError::not_connected("memory transport is disconnected"))?;
        let record = record.with_origin(origin);

        if self.drop_outbound.load(Ordering::SeqCst) {
            debug!(name = %record.name, "Dropping outbound record");
            return Ok(record);
        }

        self.hub.deliver(self.endpoint, &record);
        Ok(record)
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundRecord> {
        self.inbound.subscribe()
    }

    fn connection_id(&self) -> Option<OriginId> {
        self.connection_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(timestamp: i64) -> RawRecord {
        RawRecord::new("ping", timestamp, OriginId::empty(), serde_json::json!({"n": timestamp}))
    }

    #[tokio::test]
    async fn test_send_reaches_every_member_with_local_echo() {
        let hub = MemoryHub::default();
        let a = hub.join();
        let b = hub.join();
        let mut a_rx = a.subscribe();
        let mut b_rx = b.subscribe();

        let sent = a.send(raw(1)).await.expect("send");
        assert_eq!(Some(sent.origin_id.clone()), a.connection_id());

        let echo = a_rx.recv().await.expect("echo");
        assert!(echo.is_local);
        assert_eq!(echo.record, sent);

        let delivered = b_rx.recv().await.expect("delivery");
        assert!(!delivered.is_local);
        assert_eq!(delivered.record.origin_id, sent.origin_id);
    }

    #[tokio::test]
    async fn test_disconnected_send_fails_and_reconnect_changes_id() {
        let hub = MemoryHub::default();
        let a = hub.join();
        let first = a.connection_id().expect("connected");
        let mut states = a.connection_state();

        a.disconnect();
        assert!(!a.is_connected());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
        let err = a.send(raw(1)).await.unwrap_err();
        assert_eq!(err.kind, ephemera_core::error::ErrorKind::NotConnected);

        a.connect();
        assert!(states.has_changed().expect("sender alive"));
        assert_ne!(a.connection_id(), Some(first));
        assert_eq!(hub.connected_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_sends_are_not_delivered() {
        let hub = MemoryHub::default();
        let a = hub.join();
        let b = hub.join();
        let mut b_rx = b.subscribe();

        a.set_drop_outbound(true);
        a.send(raw(1)).await.expect("send");
        a.set_drop_outbound(false);
        a.send(raw(2)).await.expect("send");

        let delivered = b_rx.recv().await.expect("delivery");
        assert_eq!(delivered.record.timestamp, 2);
    }
}
