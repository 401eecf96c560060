//! Stamped, role-checked sends over an event transport.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time;
use tracing::{debug, warn};

use ephemera_core::error::SyncError;
use ephemera_core::result::SyncResult;
use ephemera_core::traits::{ConnectionState, EventTransport, RoleVerifier};
use ephemera_core::types::{OriginId, RawRecord, Role, TimestampedRecord};

use crate::clock::LogicalClock;
use crate::metrics::PresenceMetrics;

/// Sends locally authored records: checks roles, stamps them with the
/// logical clock and the connection id, and hands them to the transport.
#[derive(Clone)]
pub struct EventScope {
    transport: Arc<dyn EventTransport>,
    clock: LogicalClock,
    verifier: Arc<dyn RoleVerifier>,
    allowed_roles: Vec<Role>,
    connect_wait: Option<Duration>,
    metrics: Arc<PresenceMetrics>,
}

impl std::fmt::Debug for EventScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventScope")
            .field("allowed_roles", &self.allowed_roles)
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}

impl EventScope {
    /// Create an unrestricted scope.
    pub fn new(
        transport: Arc<dyn EventTransport>,
        clock: LogicalClock,
        verifier: Arc<dyn RoleVerifier>,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        Self {
            transport,
            clock,
            verifier,
            allowed_roles: Vec::new(),
            connect_wait: None,
            metrics,
        }
    }

    /// Only connections holding one of `roles` may send. Empty means anyone.
    pub fn with_allowed_roles(mut self, roles: Vec<Role>) -> Self {
        self.allowed_roles = roles;
        self
    }

    /// Bound how long sends wait for a connection. `None` waits forever.
    pub fn with_connect_wait(mut self, limit: Option<Duration>) -> Self {
        self.connect_wait = limit;
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn EventTransport> {
        &self.transport
    }

    /// The clock records are stamped with.
    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    /// Whether the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Whether sends are role-restricted.
    pub fn is_restricted(&self) -> bool {
        !self.allowed_roles.is_empty()
    }

    /// Wait for a connection and return its id.
    pub async fn wait_until_connected(&self) -> SyncResult<OriginId> {
        let mut state = self.transport.connection_state();
        let wait = async {
            loop {
                let connected = *state.borrow_and_update() == ConnectionState::Connected;
                if connected {
                    if let Some(origin) = self.transport.connection_id() {
                        return Ok(origin);
                    }
                }
                if state.changed().await.is_err() {
                    return Err(SyncError::not_connected("transport closed while waiting"));
                }
            }
        };

        match self.connect_wait {
            Some(limit) => time::timeout(limit, wait).await.map_err(|_| {
                SyncError::not_connected(format!(
                    "no connection within {}ms",
                    limit.as_millis()
                ))
            })?,
            None => wait.await,
        }
    }

    /// Fail with an authorization error unless this connection may send.
    ///
    /// Restricted scopes wait for a connection first, since roles belong
    /// to a connection.
    pub async fn verify_local_roles(&self) -> SyncResult<()> {
        if !self.is_restricted() {
            return Ok(());
        }
        let origin = self.wait_until_connected().await?;
        if self
            .verifier
            .has_any_role(&origin, &self.allowed_roles)
            .await?
        {
            Ok(())
        } else {
            warn!(connection_id = %origin, "Local broadcast denied: no permitted role");
            Err(SyncError::authorization(format!(
                "connection {origin} holds none of the roles {:?}",
                self.allowed_roles
            )))
        }
    }

    /// Stamp a record with a fresh logical timestamp and the current
    /// connection id (empty while disconnected).
    pub fn stamp<T>(&self, name: &str, data: T) -> SyncResult<TimestampedRecord<T>> {
        let timestamp = self.clock.now()?;
        let origin = self
            .transport
            .connection_id()
            .unwrap_or_else(OriginId::empty);
        Ok(TimestampedRecord::new(name, timestamp, origin, data))
    }

    /// Send an already stamped record. Fails if disconnected.
    pub async fn send<T: Serialize>(&self, record: &TimestampedRecord<T>) -> SyncResult<RawRecord> {
        let raw = record.encode()?;
        match self.transport.send(raw).await {
            Ok(sent) => {
                self.metrics.record_broadcast(true);
                debug!(name = %sent.name, timestamp = sent.timestamp, "Record sent");
                Ok(sent)
            }
            Err(e) => {
                self.metrics.record_broadcast(false);
                warn!(name = %record.name, "Failed to send record: {}", e);
                Err(e)
            }
        }
    }

    /// Check roles, wait for a connection, stamp and send `data` as `name`.
    pub async fn send_event<T: Serialize>(&self, name: &str, data: T) -> SyncResult<RawRecord> {
        self.verify_local_roles().await?;
        self.wait_until_connected().await?;
        let record = self.stamp(name, data)?;
        self.send(&record).await
    }
}
