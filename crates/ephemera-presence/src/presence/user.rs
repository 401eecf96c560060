//! Per-user view over the latest accepted presence record.

use serde_json::Value;

use ephemera_core::types::{OriginId, PresenceRecord, PresenceState, UserId};

use crate::clock::LogicalClock;

/// The latest accepted record for one user, plus lazy expiry.
///
/// The stored record is never mutated by expiry: once the logical clock is
/// more than `expiration_period_ms` past the record's timestamp, [`state`]
/// reports [`PresenceState::Offline`] while [`stored_state`] and
/// [`payload`] keep the last known values.
///
/// [`state`]: PresenceUser::state
/// [`stored_state`]: PresenceUser::stored_state
/// [`payload`]: PresenceUser::payload
#[derive(Debug, Clone)]
pub struct PresenceUser {
    record: PresenceRecord,
    expiration_period_ms: i64,
    is_local_user: bool,
    clock: LogicalClock,
}

impl PresenceUser {
    pub(crate) fn new(
        record: PresenceRecord,
        expiration_period_ms: i64,
        is_local_user: bool,
        clock: LogicalClock,
    ) -> Self {
        Self {
            record,
            expiration_period_ms,
            is_local_user,
            clock,
        }
    }

    /// The user this entry describes.
    pub fn user_id(&self) -> &UserId {
        &self.record.data.user_id
    }

    /// Connection that sent the latest accepted record.
    pub fn origin_id(&self) -> &OriginId {
        &self.record.origin_id
    }

    /// Logical timestamp of the latest accepted record.
    pub fn last_updated(&self) -> i64 {
        self.record.timestamp
    }

    /// Effective state at the clock's current reading.
    ///
    /// Falls back to the stored state when the clock has no estimate.
    pub fn state(&self) -> PresenceState {
        match self.clock.peek() {
            Ok(now) => self.state_at(now),
            Err(_) => self.stored_state(),
        }
    }

    /// Effective state at `now_ms`.
    pub fn state_at(&self, now_ms: i64) -> PresenceState {
        if self.is_expired_at(now_ms) {
            PresenceState::Offline
        } else {
            self.stored_state()
        }
    }

    /// Whether the record is older than the expiration period at `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.record.timestamp) > self.expiration_period_ms
    }

    /// State as last reported by the user, ignoring expiry.
    pub fn stored_state(&self) -> PresenceState {
        self.record.data.state
    }

    /// Last known application payload.
    pub fn payload(&self) -> Option<&Value> {
        self.record.data.payload.as_ref()
    }

    /// Whether this entry was created or updated by this client.
    pub fn is_local_user(&self) -> bool {
        self.is_local_user
    }

    /// The underlying record.
    pub fn record(&self) -> &PresenceRecord {
        &self.record
    }

    /// Expiration period applied to this user.
    pub fn expiration_period_ms(&self) -> i64 {
        self.expiration_period_ms
    }

    pub(crate) fn replace(&mut self, record: PresenceRecord, is_local: bool) {
        self.record = record;
        self.is_local_user |= is_local;
    }
}
