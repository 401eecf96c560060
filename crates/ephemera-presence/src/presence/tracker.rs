//! Application-facing presence facade for one local user.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use ephemera_core::config::PresenceConfig;
use ephemera_core::error::SyncError;
use ephemera_core::result::SyncResult;
use ephemera_core::traits::InboundRecord;
use ephemera_core::types::{
    OriginId, PresenceRecord, PresenceState, PresenceUpdate, RawRecord, UserId,
};

use super::change::PresenceChange;
use super::roster::{ListenerId, PresenceRoster};
use super::user::PresenceUser;
use crate::bridge::scope::EventScope;
use crate::sync::SyncHandler;

/// Publishes the local user's presence and exposes the merged roster.
///
/// Must be initialized exactly once before use. Local updates are applied
/// to the roster immediately and broadcast afterwards; the transport's
/// loop-back of the same record is then rejected by the merge rule.
#[derive(Clone)]
pub struct PresenceTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    user_id: UserId,
    event_name: String,
    roster: Arc<PresenceRoster>,
    scope: EventScope,
    /// Latest local state; `None` until initialized.
    local: Mutex<Option<PresenceUpdate>>,
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("user_id", &self.inner.user_id)
            .field("event_name", &self.inner.event_name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl PresenceTracker {
    /// Create an uninitialized tracker for `user_id`.
    pub fn new(
        user_id: UserId,
        config: &PresenceConfig,
        roster: Arc<PresenceRoster>,
        scope: EventScope,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                user_id,
                event_name: config.event_name.clone(),
                roster,
                scope,
                local: Mutex::new(None),
            }),
        }
    }

    /// The local user's id.
    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    /// Whether [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock_local().is_some()
    }

    /// Publish the initial local state. Allowed once.
    ///
    /// The roster reflects the new state before this returns. The record is
    /// sent right away if connected, otherwise on the next connect; a send
    /// failure here is logged and left to the next scheduled broadcast.
    pub async fn initialize(
        &self,
        state: PresenceState,
        payload: Option<Value>,
    ) -> SyncResult<PresenceUser> {
        if self.is_initialized() {
            return Err(already_initialized());
        }
        self.inner.scope.verify_local_roles().await?;

        let update = PresenceUpdate::new(self.inner.user_id.clone(), state, payload);
        let record = self.inner.scope.stamp(&self.inner.event_name, update.clone())?;
        {
            let mut local = self.inner.lock_local();
            if local.is_some() {
                return Err(already_initialized());
            }
            *local = Some(update);
        }

        let (user, _) = self.inner.roster.merge_received(record.clone(), true);
        info!(user_id = %self.inner.user_id, %state, "Presence initialized");

        if self.inner.scope.is_connected() {
            if let Err(e) = self.inner.scope.send(&record).await {
                warn!(user_id = %self.inner.user_id, "Initial presence broadcast failed: {}", e);
            }
        }
        Ok(user)
    }

    /// Replace the local state and payload.
    ///
    /// The roster is updated optimistically before the broadcast. While
    /// disconnected nothing is sent and the next connect broadcasts the
    /// latest state. A failed send is returned, but the local roster keeps
    /// the new state.
    pub async fn update(
        &self,
        state: PresenceState,
        payload: Option<Value>,
    ) -> SyncResult<PresenceUser> {
        self.ensure_initialized()?;
        self.inner.scope.verify_local_roles().await?;

        let update = PresenceUpdate::new(self.inner.user_id.clone(), state, payload);
        let record = self.inner.scope.stamp(&self.inner.event_name, update.clone())?;
        *self.inner.lock_local() = Some(update);

        let (user, _) = self.inner.roster.merge_received(record.clone(), true);

        if self.inner.scope.is_connected() {
            self.inner.scope.send(&record).await?;
        } else {
            debug!(user_id = %self.inner.user_id, "Presence update deferred until connected");
        }
        Ok(user)
    }

    /// The local user's roster entry.
    pub fn local_user(&self) -> SyncResult<PresenceUser> {
        self.ensure_initialized()?;
        self.inner
            .roster
            .find_by_user(&self.inner.user_id)
            .ok_or_else(|| SyncError::internal("local user missing from roster"))
    }

    /// Users in ascending user id order, optionally filtered by effective state.
    pub fn users(&self, filter: Option<PresenceState>) -> SyncResult<Vec<PresenceUser>> {
        self.ensure_initialized()?;
        Ok(self.inner.roster.users(filter))
    }

    /// Visit users in ascending user id order.
    pub fn for_each(
        &self,
        filter: Option<PresenceState>,
        visit: impl FnMut(&PresenceUser),
    ) -> SyncResult<()> {
        self.ensure_initialized()?;
        self.inner.roster.for_each(filter, visit);
        Ok(())
    }

    /// Number of users, optionally filtered by effective state.
    pub fn count(&self, filter: Option<PresenceState>) -> SyncResult<usize> {
        self.ensure_initialized()?;
        Ok(self.inner.roster.count(filter))
    }

    pub fn find_by_user(&self, user_id: &UserId) -> SyncResult<Option<PresenceUser>> {
        self.ensure_initialized()?;
        Ok(self.inner.roster.find_by_user(user_id))
    }

    pub fn find_by_origin(&self, origin_id: &OriginId) -> SyncResult<Option<PresenceUser>> {
        self.ensure_initialized()?;
        Ok(self.inner.roster.find_by_origin(origin_id))
    }

    /// The underlying roster. Usable before initialization.
    pub fn roster(&self) -> &Arc<PresenceRoster> {
        &self.inner.roster
    }

    /// Register a synchronous change listener.
    pub fn on_change(
        &self,
        listener: impl Fn(&PresenceChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.roster.on_change(listener)
    }

    /// Receive changes asynchronously.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceChange> {
        self.inner.roster.subscribe()
    }

    fn ensure_initialized(&self) -> SyncResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(SyncError::misuse("presence tracker used before initialize()"))
        }
    }
}

impl TrackerInner {
    fn lock_local(&self) -> MutexGuard<'_, Option<PresenceUpdate>> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn already_initialized() -> SyncError {
    SyncError::misuse("presence tracker is already initialized")
}

#[async_trait]
impl SyncHandler for PresenceTracker {
    fn event_name(&self) -> &str {
        &self.inner.event_name
    }

    /// Re-stamp the local state so peers see a fresh heartbeat.
    async fn local_state(&self) -> SyncResult<Option<RawRecord>> {
        let Some(update) = self.inner.lock_local().clone() else {
            return Ok(None);
        };
        self.inner.scope.verify_local_roles().await?;

        let record = self.inner.scope.stamp(&self.inner.event_name, update)?;
        self.inner.roster.merge_received(record.clone(), true);
        Ok(Some(record.encode()?))
    }

    /// Merge a peer's record. Asks for a broadcast when a new peer shows
    /// up, so it learns about us without waiting for the next tick.
    async fn apply_remote(&self, inbound: InboundRecord) -> SyncResult<bool> {
        let record: PresenceRecord = inbound.record.decode()?;
        let is_new_peer = !inbound.is_local
            && record.data.user_id != self.inner.user_id
            && self.inner.roster.find_by_user(&record.data.user_id).is_none();

        let (_, accepted) = self.inner.roster.merge_received(record, inbound.is_local);
        Ok(accepted && is_new_peer && self.is_initialized())
    }
}
