//! Timestamped records exchanged between session members.
//!
//! A record is immutable once sent. Its `timestamp` comes from the sender's
//! logical clock and its `origin_id` from the sender's connection; the
//! ordering rule only ever looks at those two fields.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::id::{OriginId, UserId};
use super::state::PresenceState;
use crate::result::SyncResult;

/// Anything carrying a logical timestamp and an origin tie-break.
pub trait Timestamped {
    /// Logical milliseconds since the epoch.
    fn timestamp(&self) -> i64;

    /// Connection identifier of the sender.
    fn origin_id(&self) -> &OriginId;
}

/// A named, timestamped, origin-tagged record with a typed body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampedRecord<T = ()> {
    /// Event name the record was sent under.
    pub name: String,
    /// Logical milliseconds since the epoch.
    pub timestamp: i64,
    /// Sender connection id; empty when authored while disconnected.
    #[serde(default)]
    pub origin_id: OriginId,
    /// Record body.
    pub data: T,
}

/// A record whose body has not been decoded yet.
pub type RawRecord = TimestampedRecord<serde_json::Value>;

/// A presence record: one user's state and payload at a point in time.
pub type PresenceRecord = TimestampedRecord<PresenceUpdate>;

/// Body of a presence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    /// The user this record describes.
    pub user_id: UserId,
    /// Reported state.
    pub state: PresenceState,
    /// Application payload, replaced wholesale on every update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl PresenceUpdate {
    /// Create a presence body.
    pub fn new(
        user_id: impl Into<UserId>,
        state: PresenceState,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            state,
            payload,
        }
    }
}

impl<T> TimestampedRecord<T> {
    /// Create a record.
    pub fn new(name: impl Into<String>, timestamp: i64, origin_id: OriginId, data: T) -> Self {
        Self {
            name: name.into(),
            timestamp,
            origin_id,
            data,
        }
    }

    /// Replace the origin, as the transport does when it sends.
    pub fn with_origin(mut self, origin_id: OriginId) -> Self {
        self.origin_id = origin_id;
        self
    }
}

impl<T: Serialize> TimestampedRecord<T> {
    /// Serialize the body into its wire form.
    pub fn encode(&self) -> SyncResult<RawRecord> {
        Ok(TimestampedRecord {
            name: self.name.clone(),
            timestamp: self.timestamp,
            origin_id: self.origin_id.clone(),
            data: serde_json::to_value(&self.data)?,
        })
    }
}

impl RawRecord {
    /// Decode the body into a typed record.
    pub fn decode<T: DeserializeOwned>(self) -> SyncResult<TimestampedRecord<T>> {
        let data = serde_json::from_value(self.data)?;
        Ok(TimestampedRecord {
            name: self.name,
            timestamp: self.timestamp,
            origin_id: self.origin_id,
            data,
        })
    }
}

impl<T> Timestamped for TimestampedRecord<T> {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn origin_id(&self) -> &OriginId {
        &self.origin_id
    }
}
