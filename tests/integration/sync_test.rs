//! Integration tests for driving custom replicated state with the scheduler.

mod helpers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ephemera_core::config::{ClockConfig, SyncConfig};
use ephemera_core::result::SyncResult;
use ephemera_core::traits::{EventTransport, InboundRecord, ManualClock};
use ephemera_core::types::{OriginId, RawRecord, TimestampedRecord};
use ephemera_presence::{
    EventScope, LogicalClock, ManualTimeSource, MemoryHub, MemoryTransport, PresenceMetrics,
    StaticRoleVerifier, SyncHandler, SyncScheduler, is_newer,
};

use helpers::{START_MS, settle};

const EVENT: &str = "cursor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Cursor {
    x: i32,
    y: i32,
}

/// Latest cursor per peer connection.
struct CursorBoard {
    scope: EventScope,
    local: Mutex<Option<Cursor>>,
    peers: Mutex<HashMap<OriginId, TimestampedRecord<Cursor>>>,
}

impl CursorBoard {
    fn set_local(&self, cursor: Cursor) {
        *self.local.lock().unwrap() = Some(cursor);
    }

    fn peer(&self, origin: &OriginId) -> Option<TimestampedRecord<Cursor>> {
        self.peers.lock().unwrap().get(origin).cloned()
    }
}

#[async_trait]
impl SyncHandler for CursorBoard {
    fn event_name(&self) -> &str {
        EVENT
    }

    async fn local_state(&self) -> SyncResult<Option<RawRecord>> {
        let Some(cursor) = self.local.lock().unwrap().clone() else {
            return Ok(None);
        };
        Ok(Some(self.scope.stamp(EVENT, cursor)?.encode()?))
    }

    async fn apply_remote(&self, inbound: InboundRecord) -> SyncResult<bool> {
        if inbound.is_local {
            return Ok(false);
        }
        let record: TimestampedRecord<Cursor> = inbound.record.decode()?;
        let mut peers = self.peers.lock().unwrap();
        let is_new_peer = !peers.contains_key(&record.origin_id);
        if is_newer(peers.get(&record.origin_id), &record, 0) {
            peers.insert(record.origin_id.clone(), record);
        }
        Ok(is_new_peer)
    }
}

struct Peer {
    board: Arc<CursorBoard>,
    scheduler: SyncScheduler,
    transport: Arc<MemoryTransport>,
}

async fn peer(hub: &MemoryHub, wall: &Arc<ManualClock>) -> Peer {
    let transport = Arc::new(hub.join());
    let metrics = Arc::new(PresenceMetrics::new());
    let clock = LogicalClock::new(
        Arc::new(ManualTimeSource::new(wall.clone(), 0)),
        wall.clone(),
        ClockConfig::default(),
        metrics.clone(),
    );
    clock.start().await;

    let scope = EventScope::new(
        transport.clone(),
        clock,
        Arc::new(StaticRoleVerifier::allow_all()),
        metrics.clone(),
    );
    let board = Arc::new(CursorBoard {
        scope,
        local: Mutex::new(None),
        peers: Mutex::new(HashMap::new()),
    });
    let scheduler = SyncScheduler::new(
        board.clone(),
        transport.clone(),
        SyncConfig::default(),
        metrics,
    );
    scheduler.start().expect("start scheduler");
    settle().await;

    Peer {
        board,
        scheduler,
        transport,
    }
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_now_reaches_peer() {
    let hub = MemoryHub::default();
    let wall = Arc::new(ManualClock::new(START_MS));
    let a = peer(&hub, &wall).await;
    let b = peer(&hub, &wall).await;

    a.board.set_local(Cursor { x: 3, y: 4 });
    a.scheduler.broadcast_now();
    settle().await;

    let origin = a.transport.connection_id().expect("connected");
    let seen = b.board.peer(&origin).expect("cursor received");
    assert_eq!(seen.data, Cursor { x: 3, y: 4 });
}

#[tokio::test(start_paused = true)]
async fn test_periodic_broadcast_refreshes_timestamp() {
    let hub = MemoryHub::default();
    let wall = Arc::new(ManualClock::new(START_MS));
    let a = peer(&hub, &wall).await;
    let b = peer(&hub, &wall).await;
    a.board.set_local(Cursor { x: 1, y: 1 });
    a.scheduler.broadcast_now();
    settle().await;

    let origin = a.transport.connection_id().expect("connected");
    let first = b.board.peer(&origin).expect("cursor").timestamp;

    wall.advance(15_000);
    tokio::time::advance(Duration::from_millis(15_000)).await;
    settle().await;

    let refreshed = b.board.peer(&origin).expect("cursor").timestamp;
    assert!(refreshed >= first + 15_000);
}

#[tokio::test(start_paused = true)]
async fn test_stale_delivery_is_ignored() {
    let hub = MemoryHub::default();
    let wall = Arc::new(ManualClock::new(START_MS));
    let b = peer(&hub, &wall).await;
    let raw = hub.join();

    let newer = TimestampedRecord::new(EVENT, 500, OriginId::empty(), Cursor { x: 9, y: 9 });
    let older = TimestampedRecord::new(EVENT, 400, OriginId::empty(), Cursor { x: 0, y: 0 });
    raw.send(newer.encode().expect("encode")).await.expect("send");
    raw.send(older.encode().expect("encode")).await.expect("send");
    settle().await;

    let origin = raw.connection_id().expect("connected");
    let kept = b.board.peer(&origin).expect("cursor");
    assert_eq!(kept.timestamp, 500);
    assert_eq!(kept.data, Cursor { x: 9, y: 9 });
}

#[tokio::test(start_paused = true)]
async fn test_one_off_event_through_scope() {
    let hub = MemoryHub::default();
    let wall = Arc::new(ManualClock::new(START_MS));
    let a = peer(&hub, &wall).await;
    let b = peer(&hub, &wall).await;

    let sent = a
        .board
        .scope
        .send_event(EVENT, Cursor { x: 7, y: 8 })
        .await
        .expect("send");
    settle().await;

    let seen = b.board.peer(&sent.origin_id).expect("cursor");
    assert_eq!(seen.timestamp, sent.timestamp);
    assert_eq!(seen.data, Cursor { x: 7, y: 8 });
}
