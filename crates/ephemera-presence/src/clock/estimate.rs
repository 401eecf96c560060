//! Offset estimation from a single round-trip probe.

/// Best current estimate of `server_time - local_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClockOffset {
    /// Milliseconds to add to the local clock.
    pub offset_ms: i64,
    /// Round trip of the probe that produced this estimate.
    pub source_round_trip_ms: f64,
}

impl ClockOffset {
    /// Half the round trip, rounded up: the furthest the server could be
    /// from the midpoint assumption.
    pub fn max_error_ms(&self) -> i64 {
        (self.source_round_trip_ms / 2.0).ceil() as i64
    }
}

/// One completed probe: local send time, server reply, local receipt time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProbeSample {
    pub sent_at_ms: i64,
    pub server_time_ms: i64,
    pub received_at_ms: i64,
}

impl ProbeSample {
    /// Round-trip latency. A clock that stepped backwards mid-probe reads as zero.
    pub fn latency_ms(&self) -> i64 {
        (self.received_at_ms - self.sent_at_ms).max(0)
    }

    /// Offset assuming the server answered halfway through the round trip.
    pub fn to_offset(&self) -> ClockOffset {
        let latency = self.latency_ms();
        ClockOffset {
            offset_ms: (self.server_time_ms + latency / 2) - self.received_at_ms,
            source_round_trip_ms: latency as f64,
        }
    }

    /// Whether this sample should replace `best`: always when there is none,
    /// otherwise only on a strictly lower latency.
    pub fn improves_on(&self, best: Option<&ClockOffset>) -> bool {
        match best {
            None => true,
            Some(best) => (self.latency_ms() as f64) < best.source_round_trip_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sent: i64, server: i64, received: i64) -> ProbeSample {
        ProbeSample {
            sent_at_ms: sent,
            server_time_ms: server,
            received_at_ms: received,
        }
    }

    #[test]
    fn test_offset_uses_midpoint() {
        let offset = sample(1_000, 10_000, 1_100).to_offset();
        assert_eq!(offset.offset_ms, 8_950);
        assert_eq!(offset.source_round_trip_ms, 100.0);
        assert_eq!(offset.max_error_ms(), 50);
    }

    #[test]
    fn test_max_error_rounds_up() {
        let offset = sample(0, 0, 7).to_offset();
        assert_eq!(offset.max_error_ms(), 4);
    }

    #[test]
    fn test_improvement_is_strict() {
        let best = sample(0, 500, 100).to_offset();
        assert!(sample(0, 0, 99).improves_on(Some(&best)));
        assert!(!sample(0, 0, 100).improves_on(Some(&best)));
        assert!(!sample(0, 0, 150).improves_on(Some(&best)));
        assert!(sample(0, 0, 10_000).improves_on(None));
    }

    #[test]
    fn test_backwards_local_clock_reads_as_zero_latency() {
        let probe = sample(1_000, 5_000, 900);
        assert_eq!(probe.latency_ms(), 0);
        assert_eq!(probe.to_offset().offset_ms, 4_100);
    }
}
