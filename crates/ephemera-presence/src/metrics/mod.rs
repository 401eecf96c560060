//! Presence engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::presence::change::ChangeOrigin;

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct PresenceMetrics {
    /// Accepted changes authored by this client
    pub local_changes: AtomicU64,
    /// Accepted changes authored by peers
    pub remote_changes: AtomicU64,
    /// Records rejected by the ordering rule (duplicates, loop-backs, stale)
    pub rejected_updates: AtomicU64,
    /// Records handed to the transport
    pub broadcasts_sent: AtomicU64,
    /// Sends the transport refused
    pub broadcasts_failed: AtomicU64,
    /// Time source probes that returned a server time
    pub probes_succeeded: AtomicU64,
    /// Time source probes that failed
    pub probes_failed: AtomicU64,
}

impl PresenceMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted roster change
    pub fn record_change(&self, origin: ChangeOrigin) {
        let counter = match origin {
            ChangeOrigin::Local => &self.local_changes,
            ChangeOrigin::Remote => &self.remote_changes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record the ordering rule turned away
    pub fn record_rejected(&self) {
        self.rejected_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a broadcast
    pub fn record_broadcast(&self, delivered: bool) {
        let counter = if delivered {
            &self.broadcasts_sent
        } else {
            &self.broadcasts_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a clock probe
    pub fn record_probe(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.probes_succeeded
        } else {
            &self.probes_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            local_changes: self.local_changes.load(Ordering::Relaxed),
            remote_changes: self.remote_changes.load(Ordering::Relaxed),
            rejected_updates: self.rejected_updates.load(Ordering::Relaxed),
            broadcasts_sent: self.broadcasts_sent.load(Ordering::Relaxed),
            broadcasts_failed: self.broadcasts_failed.load(Ordering::Relaxed),
            probes_succeeded: self.probes_succeeded.load(Ordering::Relaxed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Accepted local changes
    pub local_changes: u64,
    /// Accepted remote changes
    pub remote_changes: u64,
    /// Rejected records
    pub rejected_updates: u64,
    /// Successful broadcasts
    pub broadcasts_sent: u64,
    /// Failed broadcasts
    pub broadcasts_failed: u64,
    /// Successful probes
    pub probes_succeeded: u64,
    /// Failed probes
    pub probes_failed: u64,
}
