//! The ordering rule every replica applies to decide whether a received
//! record replaces the one it holds.
//!
//! With no debounce the record with the highest timestamp wins and equal
//! timestamps fall back to comparing origin ids, so any permutation of a
//! delivery sequence (duplicates included) converges to the same record.

use ephemera_core::types::Timestamped;

/// Whether `received` should replace `current`.
///
/// - No current record: always newer.
/// - Equal timestamps: newer only if `received`'s origin id sorts strictly
///   after `current`'s. Equal origins are the same sender re-delivering.
/// - `received` older: newer only if it falls within `debounce_ms` of
///   `current`, i.e. it arrived late but should have suppressed `current`.
/// - `received` more recent: newer only if at least `debounce_ms` after
///   `current`, so rapid flapping inside the window is dropped.
pub fn is_newer<C, R>(current: Option<&C>, received: &R, debounce_ms: i64) -> bool
where
    C: Timestamped + ?Sized,
    R: Timestamped + ?Sized,
{
    let Some(current) = current else {
        return true;
    };

    let held = current.timestamp();
    let incoming = received.timestamp();
    let gap = held.abs_diff(incoming);
    let window = debounce_ms.max(0) as u64;

    if held == incoming {
        current.origin_id() < received.origin_id()
    } else if held > incoming {
        gap <= window
    } else {
        gap >= window
    }
}
