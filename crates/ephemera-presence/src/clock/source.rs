//! Time source implementations that need no network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;

use ephemera_core::error::SyncError;
use ephemera_core::result::SyncResult;
use ephemera_core::traits::{LocalClock, ManualClock, ServerTime, SystemClock, TimeSource};

/// Answers every probe with the local clock, instantly.
///
/// The default when a host offers no shared time source: every client
/// trusts its own clock and the offset stays at zero.
#[derive(Debug)]
pub struct LocalTimeSource {
    clock: Arc<dyn LocalClock>,
}

impl LocalTimeSource {
    /// Answer probes from `clock`.
    pub fn new(clock: Arc<dyn LocalClock>) -> Self {
        Self { clock }
    }
}

impl Default for LocalTimeSource {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl TimeSource for LocalTimeSource {
    async fn server_time(&self) -> SyncResult<ServerTime> {
        Ok(ServerTime {
            server_time_utc_ms: self.clock.now_ms(),
        })
    }
}

/// One scripted answer of a [`ManualTimeSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedProbe {
    /// Answer after `latency_ms` of simulated round trip.
    Respond {
        /// Simulated round trip, applied to the shared manual clock.
        latency_ms: i64,
    },
    /// Wait `wait` of tokio time, then answer like `Respond`.
    Delayed {
        /// Real (tokio) delay before answering.
        wait: Duration,
        /// Simulated round trip.
        latency_ms: i64,
    },
    /// Fail the probe.
    Fail,
}

/// A scripted time source driving a shared [`ManualClock`].
///
/// Each answer advances the manual clock by the scripted latency, reading
/// the server time (clock + skew) at the midpoint. Once the script runs
/// out, probes answer with the default latency.
#[derive(Debug)]
pub struct ManualTimeSource {
    clock: Arc<ManualClock>,
    skew_ms: AtomicI64,
    default_latency_ms: i64,
    script: Mutex<VecDeque<ScriptedProbe>>,
    calls: AtomicU64,
}

impl ManualTimeSource {
    /// Serve `clock + skew_ms` as the server time.
    pub fn new(clock: Arc<ManualClock>, skew_ms: i64) -> Self {
        Self {
            clock,
            skew_ms: AtomicI64::new(skew_ms),
            default_latency_ms: 0,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Latency used once the script is exhausted.
    pub fn with_default_latency(mut self, latency_ms: i64) -> Self {
        self.default_latency_ms = latency_ms;
        self
    }

    /// Queue scripted answers.
    pub fn push(&self, probes: impl IntoIterator<Item = ScriptedProbe>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(probes);
    }

    /// Change the server's skew relative to the manual clock.
    pub fn set_skew(&self, skew_ms: i64) {
        self.skew_ms.store(skew_ms, Ordering::SeqCst);
    }

    /// Number of probes answered or failed so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, latency_ms: i64) -> ServerTime {
        let half = latency_ms / 2;
        self.clock.advance(half);
        let server_time_utc_ms = self.clock.now_ms() + self.skew_ms.load(Ordering::SeqCst);
        self.clock.advance(latency_ms - half);
        ServerTime { server_time_utc_ms }
    }
}

#[async_trait]
impl TimeSource for ManualTimeSource {
    async fn server_time(&self) -> SyncResult<ServerTime> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(ScriptedProbe::Respond {
                latency_ms: self.default_latency_ms,
            });

        match next {
            ScriptedProbe::Respond { latency_ms } => Ok(self.answer(latency_ms)),
            ScriptedProbe::Delayed { wait, latency_ms } => {
                time::sleep(wait).await;
                Ok(self.answer(latency_ms))
            }
            ScriptedProbe::Fail => Err(SyncError::probe_failure("scripted probe failure")),
        }
    }
}
