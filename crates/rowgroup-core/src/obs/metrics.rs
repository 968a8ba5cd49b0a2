use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

///
/// EventOps
/// Process-wide counters for grouping and bucketing operations.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Projector lifecycle
    pub projections_started: u64,
    pub projections_finished: u64,

    // Rows and groups
    pub rows_grouped: u64,
    pub groups_emitted: u64,
    pub rows_forwarded: u64,

    // Failures
    pub circuit_breaks: u64,
    pub upstream_failures_latched: u64,

    // Redistribution
    pub rows_bucketed: u64,
    pub bucket_passes: u64,
}

impl EventOps {
    const fn new() -> Self {
        Self {
            projections_started: 0,
            projections_finished: 0,
            rows_grouped: 0,
            groups_emitted: 0,
            rows_forwarded: 0,
            circuit_breaks: 0,
            upstream_failures_latched: 0,
            rows_bucketed: 0,
            bucket_passes: 0,
        }
    }
}

///
/// EventState
/// Ephemeral, in-memory metrics state.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct EventState {
    pub(crate) ops: EventOps,
    pub(crate) peak_accounted_bytes: u64,
}

impl EventState {
    const fn new() -> Self {
        Self {
            ops: EventOps::new(),
            peak_accounted_bytes: 0,
        }
    }
}

///
/// EventReport
/// Point-in-time snapshot of the metrics state.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub peak_accounted_bytes: u64,
}

static EVENT_STATE: Mutex<EventState> = Mutex::new(EventState::new());

/// Borrow metrics mutably.
///
/// A panic while holding the lock leaves counters usable; metrics are never
/// worth propagating a poison error for.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    let mut state = EVENT_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut state)
}

/// Snapshot the current metrics state.
pub(crate) fn report() -> EventReport {
    with_state_mut(|m| EventReport {
        ops: m.ops.clone(),
        peak_accounted_bytes: m.peak_accounted_bytes,
    })
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::new());
}
