//! Metrics sink boundary.
//!
//! Core grouping logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the process-wide metrics state.
use crate::obs::metrics;
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    ProjectionStart,
    ProjectionFinish {
        rows_grouped: u64,
        groups: u64,
        rows_forwarded: u64,
        accounted_bytes: u64,
    },
    CircuitBreak {
        attempted: u64,
        limit: u64,
    },
    UpstreamFailureLatched,
    RowsBucketed {
        rows: u64,
        buckets: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default process-wide sink that writes into the shared metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::ProjectionStart => {
                metrics::with_state_mut(|m| {
                    m.ops.projections_started = m.ops.projections_started.saturating_add(1);
                });
            }

            MetricsEvent::ProjectionFinish {
                rows_grouped,
                groups,
                rows_forwarded,
                accounted_bytes,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.projections_finished = m.ops.projections_finished.saturating_add(1);
                    m.ops.rows_grouped = m.ops.rows_grouped.saturating_add(rows_grouped);
                    m.ops.groups_emitted = m.ops.groups_emitted.saturating_add(groups);
                    m.ops.rows_forwarded = m.ops.rows_forwarded.saturating_add(rows_forwarded);
                    m.peak_accounted_bytes = m.peak_accounted_bytes.max(accounted_bytes);
                });
            }

            MetricsEvent::CircuitBreak { attempted, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.circuit_breaks = m.ops.circuit_breaks.saturating_add(1);
                    m.peak_accounted_bytes = m.peak_accounted_bytes.max(attempted);
                });
            }

            MetricsEvent::UpstreamFailureLatched => {
                metrics::with_state_mut(|m| {
                    m.ops.upstream_failures_latched =
                        m.ops.upstream_failures_latched.saturating_add(1);
                });
            }

            MetricsEvent::RowsBucketed { rows, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_bucketed = m.ops.rows_bucketed.saturating_add(rows);
                    m.ops.bucket_passes = m.ops.bucket_passes.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    if let Some(sink) = override_sink {
        sink.record(event);
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current process-wide metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all process-wide metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
///
/// Events recorded on other threads still reach the global sink.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let previous = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = previous;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///
