//! Logical clock estimating a session-wide "now".
//!
//! The clock probes its [`TimeSource`] once on [`LogicalClock::start`] and
//! then on a fixed interval, adopting a probe's offset only when its round
//! trip is strictly faster than the best seen so far. Sampling stops after
//! a configured number of consecutive probes fail to improve (failed probes
//! count as non-improving). The best estimate is kept until `stop()`.
//!
//! Timestamps issued by [`LogicalClock::now`] are strictly increasing for
//! the lifetime of the instance, even across `stop()`/`start()` and even if
//! the local clock or the adopted offset moves backwards.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ephemera_core::config::ClockConfig;
use ephemera_core::error::SyncError;
use ephemera_core::result::SyncResult;
use ephemera_core::traits::{LocalClock, SystemClock, TimeSource};

use super::estimate::{ClockOffset, ProbeSample};
use crate::metrics::PresenceMetrics;

/// Offset-corrected, strictly monotonic clock. Cloning shares the state.
#[derive(Clone)]
pub struct LogicalClock {
    inner: Arc<ClockInner>,
}

struct ClockInner {
    source: Arc<dyn TimeSource>,
    local: Arc<dyn LocalClock>,
    config: ClockConfig,
    metrics: Arc<PresenceMetrics>,
    state: Mutex<ClockState>,
}

#[derive(Default)]
struct ClockState {
    /// Best estimate so far; `None` until a probe succeeds.
    offset: Option<ClockOffset>,
    /// Last value handed out by `now()`. Survives restarts.
    last_issued: Option<i64>,
    non_improving: u32,
    samples: u32,
    /// Bumped on every start/stop so late probe results can be discarded.
    epoch: u64,
    sampling: Option<CancellationToken>,
    stabilized: bool,
}

impl ClockState {
    fn reset(&mut self) {
        if let Some(token) = self.sampling.take() {
            token.cancel();
        }
        self.offset = None;
        self.non_improving = 0;
        self.samples = 0;
        self.stabilized = false;
        self.epoch += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeOutcome {
    Continue,
    Stabilized,
    Discarded,
}

impl LogicalClock {
    /// Create a clock probing `source` and reading `local`.
    pub fn new(
        source: Arc<dyn TimeSource>,
        local: Arc<dyn LocalClock>,
        config: ClockConfig,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                source,
                local,
                config,
                metrics,
                state: Mutex::new(ClockState::default()),
            }),
        }
    }

    /// Create a clock reading the system wall clock.
    pub fn with_system_clock(source: Arc<dyn TimeSource>, config: ClockConfig) -> Self {
        Self::new(
            source,
            Arc::new(SystemClock),
            config,
            Arc::new(PresenceMetrics::new()),
        )
    }

    /// Begin sampling.
    ///
    /// The first probe completes before this returns, so `now()` is usable
    /// afterwards unless that probe failed. Further probes run on a
    /// background task. Calling `start()` again restarts sampling from
    /// scratch.
    pub async fn start(&self) {
        let (epoch, token) = {
            let mut state = self.inner.lock();
            state.reset();
            let token = CancellationToken::new();
            state.sampling = Some(token.clone());
            (state.epoch, token)
        };

        info!(
            interval_ms = self.inner.config.sample_interval_ms,
            "Logical clock sampling started"
        );

        if self.inner.probe(epoch, &token).await == ProbeOutcome::Continue {
            tokio::spawn(run_sampler(Arc::clone(&self.inner), epoch, token));
        }
    }

    /// Cancel sampling and discard the estimate.
    ///
    /// Probes still in flight are discarded when they complete.
    pub fn stop(&self) {
        self.inner.lock().reset();
        info!("Logical clock stopped");
    }

    /// Issue a timestamp strictly greater than every previous one.
    pub fn now(&self) -> SyncResult<i64> {
        let mut state = self.inner.lock();
        let offset = state.offset.ok_or_else(not_synchronized)?;
        let raw = self.inner.local.now_ms() + offset.offset_ms;
        let issued = match state.last_issued {
            Some(last) if raw <= last => last + 1,
            _ => raw,
        };
        state.last_issued = Some(issued);
        Ok(issued)
    }

    /// Read the current estimate without issuing a timestamp.
    ///
    /// Never below the last issued value, but repeated reads may be equal.
    pub fn peek(&self) -> SyncResult<i64> {
        let state = self.inner.lock();
        let offset = state.offset.ok_or_else(not_synchronized)?;
        let raw = self.inner.local.now_ms() + offset.offset_ms;
        Ok(state.last_issued.map_or(raw, |last| raw.max(last)))
    }

    /// Error bound of the current estimate: half its probe's round trip.
    pub fn max_error(&self) -> SyncResult<i64> {
        self.inner
            .lock()
            .offset
            .map(|offset| offset.max_error_ms())
            .ok_or_else(not_synchronized)
    }

    /// Whether at least one probe has succeeded since the last start.
    pub fn is_synchronized(&self) -> bool {
        self.inner.lock().offset.is_some()
    }

    /// Whether sampling has stopped for lack of improvement.
    pub fn is_stabilized(&self) -> bool {
        self.inner.lock().stabilized
    }

    /// Probes completed (successful or not) since the last start.
    pub fn sample_count(&self) -> u32 {
        self.inner.lock().samples
    }

    #[cfg(test)]
    fn offset_ms(&self) -> Option<i64> {
        self.inner.lock().offset.map(|offset| offset.offset_ms)
    }
}

impl fmt::Debug for LogicalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("LogicalClock")
            .field("synchronized", &state.offset.is_some())
            .field("stabilized", &state.stabilized)
            .field("samples", &state.samples)
            .finish()
    }
}

impl ClockInner {
    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one round trip and fold it into the estimate.
    async fn probe(&self, epoch: u64, token: &CancellationToken) -> ProbeOutcome {
        let sent_at_ms = self.local.now_ms();
        let result = tokio::select! {
            _ = token.cancelled() => return ProbeOutcome::Discarded,
            result = self.source.server_time() => result,
        };
        let received_at_ms = self.local.now_ms();

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!("Discarding probe that completed after the clock was stopped");
            return ProbeOutcome::Discarded;
        }
        state.samples += 1;

        match result {
            Ok(server) => {
                self.metrics.record_probe(true);
                let sample = ProbeSample {
                    sent_at_ms,
                    server_time_ms: server.server_time_utc_ms,
                    received_at_ms,
                };
                if sample.improves_on(state.offset.as_ref()) {
                    let offset = sample.to_offset();
                    debug!(
                        offset_ms = offset.offset_ms,
                        round_trip_ms = offset.source_round_trip_ms,
                        "Adopted clock offset"
                    );
                    state.offset = Some(offset);
                    state.non_improving = 0;
                } else {
                    state.non_improving += 1;
                    debug!(
                        round_trip_ms = sample.latency_ms(),
                        attempts = state.non_improving,
                        "Clock probe did not improve the estimate"
                    );
                }
            }
            Err(e) => {
                self.metrics.record_probe(false);
                state.non_improving += 1;
                warn!(attempts = state.non_improving, "Clock probe failed: {}", e);
            }
        }

        if state.non_improving >= self.config.max_non_improving_attempts {
            state.stabilized = true;
            state.sampling = None;
            info!(
                samples = state.samples,
                max_error_ms = state.offset.map(|o| o.max_error_ms()),
                "Logical clock stabilized"
            );
            ProbeOutcome::Stabilized
        } else {
            ProbeOutcome::Continue
        }
    }
}

/// Probe on a fixed interval until stabilized or cancelled.
async fn run_sampler(inner: Arc<ClockInner>, epoch: u64, token: CancellationToken) {
    let mut interval = time::interval(inner.config.sample_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; start() already probed.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        if inner.probe(epoch, &token).await != ProbeOutcome::Continue {
            break;
        }
    }

    debug!("Clock sampling loop ended");
}

fn not_synchronized() -> SyncError {
    SyncError::not_synchronized("no successful time source probe yet")
}
