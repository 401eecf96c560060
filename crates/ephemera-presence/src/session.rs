//! Top-level presence session that wires the subsystems together.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use ephemera_core::config::EphemeraConfig;
use ephemera_core::error::SyncError;
use ephemera_core::result::SyncResult;
use ephemera_core::traits::{EventTransport, LocalClock, RoleVerifier, SystemClock, TimeSource};
use ephemera_core::types::{PresenceState, UserId};

use crate::bridge::roles::StaticRoleVerifier;
use crate::bridge::scope::EventScope;
use crate::clock::source::LocalTimeSource;
use crate::clock::LogicalClock;
use crate::metrics::PresenceMetrics;
use crate::presence::roster::PresenceRoster;
use crate::presence::tracker::PresenceTracker;
use crate::presence::user::PresenceUser;
use crate::sync::SyncScheduler;

/// Collaborators a session is built from.
///
/// Only the transport is required; the rest default to local
/// implementations.
#[derive(Clone)]
pub struct SessionContext {
    pub transport: Arc<dyn EventTransport>,
    pub time_source: Arc<dyn TimeSource>,
    pub local_clock: Arc<dyn LocalClock>,
    pub role_verifier: Arc<dyn RoleVerifier>,
}

impl SessionContext {
    /// Context with local time and no role restrictions.
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self {
            transport,
            time_source: Arc::new(LocalTimeSource::default()),
            local_clock: Arc::new(SystemClock),
            role_verifier: Arc::new(StaticRoleVerifier::allow_all()),
        }
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn with_local_clock(mut self, local_clock: Arc<dyn LocalClock>) -> Self {
        self.local_clock = local_clock;
        self
    }

    pub fn with_role_verifier(mut self, role_verifier: Arc<dyn RoleVerifier>) -> Self {
        self.role_verifier = role_verifier;
        self
    }
}

/// One client's presence: clock, roster, tracker and scheduler over a
/// single transport.
pub struct PresenceSession {
    /// Logical clock.
    pub clock: LogicalClock,
    /// Local user's presence facade.
    pub tracker: PresenceTracker,
    /// Counters shared by every subsystem.
    pub metrics: Arc<PresenceMetrics>,
    scheduler: SyncScheduler,
}

impl std::fmt::Debug for PresenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceSession")
            .field("tracker", &self.tracker)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl PresenceSession {
    /// Build a stopped session for `user_id`.
    pub fn new(config: &EphemeraConfig, user_id: UserId, context: SessionContext) -> Self {
        let metrics = Arc::new(PresenceMetrics::new());
        let clock = LogicalClock::new(
            context.time_source,
            context.local_clock,
            config.clock.clone(),
            metrics.clone(),
        );
        let scope = EventScope::new(
            context.transport.clone(),
            clock.clone(),
            context.role_verifier,
            metrics.clone(),
        )
        .with_allowed_roles(config.presence.allowed_roles.clone())
        .with_connect_wait(config.sync.connect_wait_timeout());
        let roster = Arc::new(PresenceRoster::new(
            clock.clone(),
            config.presence.expiration_period_ms,
            metrics.clone(),
        ));
        let tracker = PresenceTracker::new(user_id, &config.presence, roster, scope);
        let scheduler = SyncScheduler::new(
            Arc::new(tracker.clone()),
            context.transport,
            config.sync.clone(),
            metrics.clone(),
        );

        Self {
            clock,
            tracker,
            metrics,
            scheduler,
        }
    }

    /// Synchronize the clock, then begin broadcasting and receiving.
    pub async fn start(&self) -> SyncResult<()> {
        if self.scheduler.is_running() {
            return Err(SyncError::misuse("presence session is already started"));
        }
        self.clock.start().await;
        self.scheduler.start()?;
        info!(user_id = %self.tracker.user_id(), "Presence session started");
        Ok(())
    }

    /// Publish the local user's initial state.
    pub async fn initialize(
        &self,
        state: PresenceState,
        payload: Option<Value>,
    ) -> SyncResult<PresenceUser> {
        self.tracker.initialize(state, payload).await
    }

    /// Replace the local user's state and payload.
    pub async fn update(
        &self,
        state: PresenceState,
        payload: Option<Value>,
    ) -> SyncResult<PresenceUser> {
        self.tracker.update(state, payload).await
    }

    /// Broadcast local state now instead of waiting for the next tick.
    pub fn broadcast_now(&self) {
        self.scheduler.broadcast_now();
    }

    /// Whether the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Stop the scheduler and the clock. The roster keeps its contents.
    pub fn shutdown(&self) {
        self.scheduler.stop();
        self.clock.stop();
        info!(user_id = %self.tracker.user_id(), "Presence session shut down");
    }
}
