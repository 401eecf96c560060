//! Background task that keeps peers' copies of local state fresh.
//!
//! Local state is broadcast whenever the transport connects, on every
//! `update_interval` tick while connected, and on demand. Inbound records
//! for the handler's event name are dispatched to the handler. Delivery is
//! at-most-once; nothing is retried here.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Notify};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ephemera_core::config::SyncConfig;
use ephemera_core::error::SyncError;
use ephemera_core::result::SyncResult;
use ephemera_core::traits::{ConnectionState, EventTransport, InboundRecord};

use super::handler::SyncHandler;
use crate::metrics::PresenceMetrics;

/// Drives one [`SyncHandler`] over one transport.
///
/// Dropping the scheduler stops it.
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    handler: Arc<dyn SyncHandler>,
    transport: Arc<dyn EventTransport>,
    config: SyncConfig,
    metrics: Arc<PresenceMetrics>,
    trigger: Notify,
    running: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("event_name", &self.inner.handler.event_name())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SyncScheduler {
    /// Create a stopped scheduler.
    pub fn new(
        handler: Arc<dyn SyncHandler>,
        transport: Arc<dyn EventTransport>,
        config: SyncConfig,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                handler,
                transport,
                config,
                metrics,
                trigger: Notify::new(),
                running: Mutex::new(None),
            }),
        }
    }

    /// Spawn the scheduling task. Must be called inside a tokio runtime.
    ///
    /// Broadcasts immediately if the transport is already connected.
    pub fn start(&self) -> SyncResult<()> {
        let token = {
            let mut running = self.inner.lock_running();
            if running.as_ref().is_some_and(|t| !t.is_cancelled()) {
                return Err(SyncError::misuse("sync scheduler is already running"));
            }
            let token = CancellationToken::new();
            *running = Some(token.clone());
            token
        };

        // Subscribe before spawning so nothing sent in between is missed.
        let inbound = self.inner.transport.subscribe();
        let states = self.inner.transport.connection_state();

        info!(
            event_name = self.inner.handler.event_name(),
            update_interval_ms = self.inner.config.update_interval_ms,
            "Sync scheduler started"
        );
        tokio::spawn(run(Arc::clone(&self.inner), token, inbound, states));
        Ok(())
    }

    /// Cancel the scheduling task. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(token) = self.inner.lock_running().take() {
            token.cancel();
            info!(
                event_name = self.inner.handler.event_name(),
                "Sync scheduler stopped"
            );
        }
    }

    /// Whether the scheduling task is active.
    pub fn is_running(&self) -> bool {
        self.inner
            .lock_running()
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    /// Ask the running task to broadcast local state now.
    ///
    /// Ignored while disconnected; the next connect broadcasts anyway.
    pub fn broadcast_now(&self) {
        self.inner.trigger.notify_one();
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.inner.lock_running().take() {
            token.cancel();
        }
    }
}

impl SchedulerInner {
    fn lock_running(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Build local state and send it. Failures are logged and dropped.
    async fn broadcast(&self) {
        let record = match self.handler.local_state().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(event_name = self.handler.event_name(), "No local state to broadcast");
                return;
            }
            Err(e) => {
                warn!(
                    event_name = self.handler.event_name(),
                    "Failed to build local state: {}", e
                );
                return;
            }
        };

        match self.transport.send(record).await {
            Ok(sent) => {
                self.metrics.record_broadcast(true);
                debug!(
                    event_name = %sent.name,
                    timestamp = sent.timestamp,
                    "Broadcast local state"
                );
            }
            Err(e) if e.is_transient() => {
                self.metrics.record_broadcast(false);
                debug!(
                    event_name = self.handler.event_name(),
                    "Skipped broadcast: {}", e
                );
            }
            Err(e) => {
                self.metrics.record_broadcast(false);
                warn!(
                    event_name = self.handler.event_name(),
                    "Failed to broadcast local state: {}", e
                );
            }
        }
    }

    /// Broadcast unless cancelled first. Returns `false` on cancellation.
    async fn broadcast_or_cancel(&self, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = self.broadcast() => true,
        }
    }
}

async fn run(
    inner: Arc<SchedulerInner>,
    token: CancellationToken,
    mut inbound: broadcast::Receiver<InboundRecord>,
    mut states: watch::Receiver<ConnectionState>,
) {
    let mut interval = time::interval(inner.config.update_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; the connect check below covers it.
    interval.tick().await;

    let connected = *states.borrow_and_update() == ConnectionState::Connected;
    if connected && !inner.broadcast_or_cancel(&token).await {
        return;
    }

    loop {
        let should_broadcast = tokio::select! {
            _ = token.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    debug!("Transport dropped its connection state; ending sync loop");
                    break;
                }
                let connected = *states.borrow_and_update() == ConnectionState::Connected;
                if connected {
                    info!(event_name = inner.handler.event_name(), "Transport connected");
                } else {
                    info!(event_name = inner.handler.event_name(), "Transport disconnected");
                }
                connected
            }
            _ = interval.tick() => inner.transport.is_connected(),
            _ = inner.trigger.notified() => inner.transport.is_connected(),
            received = inbound.recv() => match received {
                Ok(record) => {
                    if record.record.name != inner.handler.event_name() {
                        continue;
                    }
                    match inner.handler.apply_remote(record).await {
                        Ok(rebroadcast) => rebroadcast && inner.transport.is_connected(),
                        Err(e) => {
                            warn!(
                                event_name = inner.handler.event_name(),
                                "Failed to apply received record: {}", e
                            );
                            false
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Sync scheduler lagged behind inbound records");
                    false
                }
                Err(RecvError::Closed) => {
                    debug!("Inbound channel closed; ending sync loop");
                    break;
                }
            },
        };

        if should_broadcast && !inner.broadcast_or_cancel(&token).await {
            break;
        }
    }

    debug!(event_name = inner.handler.event_name(), "Sync loop ended");
}
