//! Sorted roster of per-user presence records.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::debug;

use ephemera_core::types::{OriginId, PresenceRecord, PresenceState, UserId};

use super::change::{ChangeOrigin, PresenceChange};
use super::user::PresenceUser;
use crate::clock::LogicalClock;
use crate::metrics::PresenceMetrics;
use crate::ordering::is_newer;

/// Handle returned by [`PresenceRoster::on_change`].
pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&PresenceChange) + Send + Sync>;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// The merged, per-user view of presence held by one client.
///
/// Holds at most one entry per user, ordered by user id ascending. Entries
/// are never removed; a silent user's effective state degrades to offline.
///
/// Listeners registered with [`on_change`](Self::on_change) run
/// synchronously on the same call that accepted the change, after the
/// roster lock is released, so they may read the roster.
pub struct PresenceRoster {
    clock: LogicalClock,
    expiration_period_ms: i64,
    users: Mutex<Vec<PresenceUser>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    events: broadcast::Sender<PresenceChange>,
    metrics: Arc<PresenceMetrics>,
}

impl std::fmt::Debug for PresenceRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceRoster")
            .field("users", &self.lock_users().len())
            .field("expiration_period_ms", &self.expiration_period_ms)
            .finish()
    }
}

impl PresenceRoster {
    /// Create an empty roster whose expiry is measured against `clock`.
    pub fn new(
        clock: LogicalClock,
        expiration_period_ms: i64,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            clock,
            expiration_period_ms,
            users: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            events,
            metrics,
        }
    }

    /// Merge a received record.
    ///
    /// Returns the user's entry after the merge and whether the record was
    /// accepted. An accepted record (including the first one for a user)
    /// notifies listeners before this returns.
    pub fn merge_received(&self, record: PresenceRecord, is_local: bool) -> (PresenceUser, bool) {
        let origin = ChangeOrigin::from_local(is_local);

        let change = {
            let mut users = self.lock_users();
            match users.binary_search_by(|user| user.user_id().cmp(&record.data.user_id)) {
                Ok(index) => {
                    let existing = &mut users[index];
                    if !is_newer(Some(existing.record()), &record, 0) {
                        debug!(
                            user_id = %record.data.user_id,
                            timestamp = record.timestamp,
                            held = existing.last_updated(),
                            "Rejected presence record"
                        );
                        self.metrics.record_rejected();
                        return (existing.clone(), false);
                    }
                    existing.replace(record, is_local);
                    PresenceChange {
                        user: existing.clone(),
                        origin,
                        is_new_user: false,
                    }
                }
                Err(index) => {
                    let user = PresenceUser::new(
                        record,
                        self.expiration_period_ms,
                        is_local,
                        self.clock.clone(),
                    );
                    users.insert(index, user.clone());
                    PresenceChange {
                        user,
                        origin,
                        is_new_user: true,
                    }
                }
            }
        };

        debug!(
            user_id = %change.user.user_id(),
            state = %change.user.stored_state(),
            timestamp = change.user.last_updated(),
            ?origin,
            "Accepted presence record"
        );
        self.notify(&change);
        (change.user, true)
    }

    /// Visit users in ascending user id order, optionally only those whose
    /// effective state equals `filter`.
    ///
    /// Iterates over a snapshot; merges during the visit are not observed.
    pub fn for_each(&self, filter: Option<PresenceState>, mut visit: impl FnMut(&PresenceUser)) {
        for user in self.users(filter) {
            visit(&user);
        }
    }

    /// Snapshot of users in ascending user id order, optionally filtered.
    pub fn users(&self, filter: Option<PresenceState>) -> Vec<PresenceUser> {
        let snapshot = self.lock_users().clone();
        let Some(wanted) = filter else {
            return snapshot;
        };
        let now = self.clock.peek().ok();
        snapshot
            .into_iter()
            .filter(|user| effective_state(user, now) == wanted)
            .collect()
    }

    /// Number of users, optionally only those in the `filter` state.
    pub fn count(&self, filter: Option<PresenceState>) -> usize {
        let users = self.lock_users();
        match filter {
            None => users.len(),
            Some(wanted) => {
                let now = self.clock.peek().ok();
                users
                    .iter()
                    .filter(|user| effective_state(user, now) == wanted)
                    .count()
            }
        }
    }

    /// The entry for `user_id`, if any record for it was merged.
    pub fn find_by_user(&self, user_id: &UserId) -> Option<PresenceUser> {
        let users = self.lock_users();
        users
            .binary_search_by(|user| user.user_id().cmp(user_id))
            .ok()
            .map(|index| users[index].clone())
    }

    /// The entry whose latest accepted record came from `origin_id`.
    pub fn find_by_origin(&self, origin_id: &OriginId) -> Option<PresenceUser> {
        self.lock_users()
            .iter()
            .find(|user| user.origin_id() == origin_id)
            .cloned()
    }

    /// Register a synchronous change listener.
    pub fn on_change(
        &self,
        listener: impl Fn(&PresenceChange) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Receive changes asynchronously. Slow receivers may lag.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceChange> {
        self.events.subscribe()
    }

    /// Expiration period applied to new entries.
    pub fn expiration_period_ms(&self) -> i64 {
        self.expiration_period_ms
    }

    fn notify(&self, change: &PresenceChange) {
        self.metrics.record_change(change.origin);

        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(change);
        }

        // No subscribers is fine.
        let _ = self.events.send(change.clone());
    }

    fn lock_users(&self) -> MutexGuard<'_, Vec<PresenceUser>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn effective_state(user: &PresenceUser, now: Option<i64>) -> PresenceState {
    match now {
        Some(now) => user.state_at(now),
        None => user.stored_state(),
    }
}
