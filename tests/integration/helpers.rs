//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ephemera_core::config::EphemeraConfig;
use ephemera_core::traits::{ManualClock, RoleVerifier};
use ephemera_core::types::UserId;
use ephemera_presence::{
    ManualTimeSource, MemoryHub, MemoryTransport, PresenceSession, SessionContext,
};

/// Wall-clock reading every simulated client starts from.
pub const START_MS: i64 = 1_700_000_000_000;

/// A set of simulated clients sharing one relay and one manual wall clock.
pub struct TestWorld {
    /// The in-memory relay
    pub hub: MemoryHub,
    /// Shared local clock; the time sources answer with zero skew
    pub clock: Arc<ManualClock>,
    /// Config every client is built with
    pub config: EphemeraConfig,
}

/// One simulated client.
pub struct TestClient {
    pub session: PresenceSession,
    pub transport: Arc<MemoryTransport>,
}

impl TestWorld {
    /// Create a world with default configuration
    pub fn new() -> Self {
        Self::with_config(EphemeraConfig::default())
    }

    /// Create a world with the given configuration
    pub fn with_config(config: EphemeraConfig) -> Self {
        Self {
            hub: MemoryHub::default(),
            clock: Arc::new(ManualClock::new(START_MS)),
            config,
        }
    }

    /// Join a new, unstarted client
    pub fn client(&self, user_id: &str) -> TestClient {
        let transport = Arc::new(self.hub.join());
        let context = SessionContext::new(transport.clone())
            .with_local_clock(self.clock.clone())
            .with_time_source(Arc::new(ManualTimeSource::new(self.clock.clone(), 0)));
        TestClient {
            session: PresenceSession::new(&self.config, UserId::from(user_id), context),
            transport,
        }
    }

    /// Join a new, unstarted client whose roles come from `verifier`
    pub fn client_with_roles(&self, user_id: &str, verifier: Arc<dyn RoleVerifier>) -> TestClient {
        let transport = Arc::new(self.hub.join());
        let context = SessionContext::new(transport.clone())
            .with_local_clock(self.clock.clone())
            .with_time_source(Arc::new(ManualTimeSource::new(self.clock.clone(), 0)))
            .with_role_verifier(verifier);
        TestClient {
            session: PresenceSession::new(&self.config, UserId::from(user_id), context),
            transport,
        }
    }

    /// Join and start a new client
    pub async fn started_client(&self, user_id: &str) -> TestClient {
        let client = self.client(user_id);
        client.session.start().await.expect("start session");
        settle().await;
        client
    }

    /// Move the shared wall clock without letting timers fire
    pub async fn advance_wall_clock(&self, ms: i64) {
        self.clock.advance(ms);
        settle().await;
    }

    /// Move both the wall clock and tokio time, so timers fire
    pub async fn advance(&self, ms: i64) {
        self.clock.advance(ms);
        tokio::time::advance(Duration::from_millis(ms as u64)).await;
        settle().await;
    }
}

/// Let spawned tasks drain their queues
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
