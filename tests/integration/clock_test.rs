//! Integration tests for logical clock agreement between clients.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use ephemera_core::config::ClockConfig;
use ephemera_core::error::ErrorKind;
use ephemera_core::traits::ManualClock;
use ephemera_presence::{LogicalClock, ManualTimeSource, PresenceMetrics, ScriptedProbe};

/// Shared server time at the moment every client starts.
const SERVER_MS: i64 = 2_000_000;

fn client_clock(local_ms: i64) -> (LogicalClock, Arc<ManualTimeSource>) {
    let local = Arc::new(ManualClock::new(local_ms));
    let source = Arc::new(ManualTimeSource::new(local.clone(), SERVER_MS - local_ms));
    let clock = LogicalClock::new(
        source.clone(),
        local,
        ClockConfig::default(),
        Arc::new(PresenceMetrics::new()),
    );
    (clock, source)
}

#[tokio::test(start_paused = true)]
async fn test_skewed_clients_agree_within_error_bound() {
    let (fast, fast_source) = client_clock(2_500_000);
    let (slow, slow_source) = client_clock(1_000_000);
    fast_source.push([ScriptedProbe::Respond { latency_ms: 100 }]);
    slow_source.push([ScriptedProbe::Respond { latency_ms: 60 }]);

    fast.start().await;
    slow.start().await;

    let a = fast.now().expect("fast now");
    let b = slow.now().expect("slow now");
    let bound = fast.max_error().expect("fast error") + slow.max_error().expect("slow error");
    assert!((a - b).abs() <= bound, "{a} vs {b} exceeds {bound}");
    assert_eq!(fast.max_error().expect("error"), 50);
    assert_eq!(slow.max_error().expect("error"), 30);
}

#[tokio::test(start_paused = true)]
async fn test_sampling_settles_on_fastest_probe() {
    let local = Arc::new(ManualClock::new(1_000_000));
    let source = Arc::new(ManualTimeSource::new(local.clone(), 0).with_default_latency(80));
    source.push([
        ScriptedProbe::Respond { latency_ms: 200 },
        ScriptedProbe::Fail,
        ScriptedProbe::Respond { latency_ms: 40 },
    ]);
    let config = ClockConfig::default();
    let clock = LogicalClock::new(
        source.clone(),
        local,
        config.clone(),
        Arc::new(PresenceMetrics::new()),
    );

    clock.start().await;
    assert_eq!(clock.max_error().expect("error"), 100);

    for _ in 0..10 {
        tokio::time::advance(Duration::from_millis(config.sample_interval_ms)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    assert!(clock.is_stabilized());
    assert_eq!(clock.max_error().expect("error"), 20);
    // 200ms, failure, 40ms, then five slower probes.
    assert_eq!(source.calls(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_probe_leaves_clock_unsynchronized() {
    let local = Arc::new(ManualClock::new(1_000_000));
    let source = Arc::new(ManualTimeSource::new(local.clone(), 0));
    source.push([ScriptedProbe::Fail]);
    let clock = LogicalClock::new(
        source,
        local,
        ClockConfig::default(),
        Arc::new(PresenceMetrics::new()),
    );

    clock.start().await;
    assert!(!clock.is_synchronized());
    assert_eq!(clock.now().unwrap_err().kind, ErrorKind::ClockNotSynchronized);
}
