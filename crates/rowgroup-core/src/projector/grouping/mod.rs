//! Module: projector::grouping
//! Responsibility: fold pushed rows into an in-memory group table under the
//! query memory ceiling, then drain one row per group downstream.
//! Does not own: aggregate semantics or the ceiling itself.
//! Boundary: one `GroupingProjector` per partition; producers push through
//! the `Projector` protocol and completion is counted across all of them.

mod grouper;

#[cfg(test)]
mod tests;

use crate::{
    aggregate::{AggregationCollector, AggregationContext},
    breaker::{RamAccountingContext, SizeEstimator},
    error::{ConfigurationError, GroupError, InternalError},
    expr::{CollectExpression, Input},
    obs::sink::{MetricsEvent, record},
    projector::{Projector, ProjectorUpstream},
    row::Row,
};
use grouper::Grouper;
use log::debug;
use rowgroup_primitives::DataType;
use std::sync::{
    Arc, Mutex, MutexGuard, OnceLock, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

/// Fixed footprint charged once when a grouping projector is built.
const GROUPER_OVERHEAD_BYTES: u64 = 8;

///
/// Phase
///

enum Phase {
    Grouping(Grouper),
    Drained,
    Aborted,
}

///
/// GroupingState
///
/// Everything row folding touches. Guarded by one lock so that folding,
/// the final decrement, and the drain never interleave.
///

struct GroupingState {
    phase: Phase,
    expressions: Vec<Box<dyn CollectExpression>>,
    downstream: Option<Arc<dyn Projector>>,
    rows_grouped: u64,
}

///
/// GroupingProjector
///
/// Group-by stage of the pipeline. Rows pushed by any number of producers
/// are folded into one group table; when the last producer reports, the
/// table is drained into rows of `key columns ++ aggregate values` and
/// pushed to the downstream projector.
///
/// Output order is unspecified.
///

pub struct GroupingProjector {
    state: Mutex<GroupingState>,
    remaining_upstreams: AtomicUsize,
    failure: OnceLock<GroupError>,
    ram: Arc<RamAccountingContext>,
}

impl GroupingProjector {
    /// Build one grouping projector.
    ///
    /// `key_types[i]` declares the type of `key_inputs[i]`. Every input,
    /// key or aggregate, must reference a bound collect expression.
    pub fn new(
        key_types: &[DataType],
        key_inputs: Vec<Input>,
        expressions: Vec<Box<dyn CollectExpression>>,
        aggregations: &[AggregationContext],
        ram: Arc<RamAccountingContext>,
    ) -> Result<Self, GroupError> {
        if key_types.len() != key_inputs.len() {
            return Err(ConfigurationError::KeyArityMismatch {
                key_types: key_types.len(),
                key_inputs: key_inputs.len(),
            }
            .into());
        }

        let mut keys = Vec::with_capacity(key_inputs.len());
        for (index, (data_type, input)) in key_types.iter().copied().zip(key_inputs).enumerate() {
            input.validate(expressions.len())?;
            keys.push((input, key_estimator(index, data_type)?));
        }

        let collectors = aggregations
            .iter()
            .map(|context| AggregationCollector::new(context, expressions.len()))
            .collect::<Result<Vec<_>, _>>()?;

        ram.add_bytes(GROUPER_OVERHEAD_BYTES)?;

        Ok(Self {
            state: Mutex::new(GroupingState {
                phase: Phase::Grouping(Grouper::new(keys, collectors)),
                expressions,
                downstream: None,
                rows_grouped: 0,
            }),
            remaining_upstreams: AtomicUsize::new(0),
            failure: OnceLock::new(),
            ram,
        })
    }

    /// Number of distinct groups currently held, for diagnostics.
    ///
    /// Zero once the table has been drained or discarded.
    #[must_use]
    pub fn group_count(&self) -> usize {
        match &self.lock_recovered().phase {
            Phase::Grouping(grouper) => grouper.len(),
            Phase::Drained | Phase::Aborted => 0,
        }
    }

    /// Producers that have registered but not yet reported.
    #[must_use]
    pub fn remaining_upstreams(&self) -> usize {
        self.remaining_upstreams.load(Ordering::SeqCst)
    }

    /// The first failure latched from a non-final producer, if any.
    #[must_use]
    pub fn latched_failure(&self) -> Option<&GroupError> {
        self.failure.get()
    }

    fn lock(&self) -> Result<MutexGuard<'_, GroupingState>, GroupError> {
        self.state.lock().map_err(|_| {
            InternalError::projector_internal("grouping state lock poisoned by a panicking producer")
                .into()
        })
    }

    fn lock_recovered(&self) -> MutexGuard<'_, GroupingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Release one producer; true when this release completes the projection.
    fn release_upstream(&self) -> bool {
        let (Ok(previous) | Err(previous)) =
            self.remaining_upstreams
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    Some(remaining.saturating_sub(1))
                });

        previous <= 1
    }

    // Drain the table downstream. Caller holds the state lock.
    fn drain(&self, state: &mut GroupingState) -> Result<(), GroupError> {
        let grouper = match std::mem::replace(&mut state.phase, Phase::Drained) {
            Phase::Grouping(grouper) => grouper,
            Phase::Aborted => {
                state.phase = Phase::Aborted;
                return Ok(());
            }
            Phase::Drained => {
                return Err(InternalError::projector_invariant(
                    "upstream completion reported after the group table was drained",
                )
                .into());
            }
        };

        if let (Some(failure), Some(downstream)) = (self.failure.get(), &state.downstream) {
            downstream.upstream_failed(failure.clone());
        }

        let rows = match grouper.finish(&self.ram) {
            Ok(rows) => rows,
            Err(err) => {
                state.phase = Phase::Aborted;
                if let Some(downstream) = state.downstream.take() {
                    downstream.upstream_failed(err.clone());
                }
                return Err(err);
            }
        };

        let mut forwarded = 0u64;
        if let Some(downstream) = state.downstream.take() {
            if let Err(err) = forward(downstream.as_ref(), &rows, &mut forwarded) {
                downstream.upstream_failed(err.clone());
                return Err(err);
            }
            downstream.upstream_finished()?;
        }

        debug!(
            "grouping operation size is: {} bytes ({} groups)",
            self.ram.total_bytes(),
            rows.len()
        );
        record(MetricsEvent::ProjectionFinish {
            rows_grouped: state.rows_grouped,
            groups: rows.len() as u64,
            rows_forwarded: forwarded,
            accounted_bytes: self.ram.total_bytes(),
        });

        Ok(())
    }
}

// Push drained rows until downstream refuses more.
fn forward(
    downstream: &dyn Projector,
    rows: &[Row],
    forwarded: &mut u64,
) -> Result<(), GroupError> {
    for row in rows {
        *forwarded += 1;
        if !downstream.set_next_row(row)? {
            break;
        }
    }

    Ok(())
}

// Resolve the size estimator for one key column, rejecting ungroupable types.
fn key_estimator(index: usize, data_type: DataType) -> Result<SizeEstimator, ConfigurationError> {
    if !data_type.is_known() {
        return Err(ConfigurationError::UnknownKeyType { index });
    }
    if !data_type.is_hashable() {
        return Err(ConfigurationError::UnhashableKeyType { index, data_type });
    }

    SizeEstimator::for_type(data_type)
}

impl Projector for GroupingProjector {
    fn start_projection(&self) -> Result<(), GroupError> {
        let mut state = self.lock()?;
        for expression in &mut state.expressions {
            expression.start_collect();
        }
        record(MetricsEvent::ProjectionStart);

        if self.remaining_upstreams.load(Ordering::SeqCst) == 0 {
            return self.drain(&mut state);
        }

        Ok(())
    }

    fn set_next_row(&self, row: &Row) -> Result<bool, GroupError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let grouper = match &mut state.phase {
            Phase::Grouping(grouper) => grouper,
            Phase::Aborted => return Ok(false),
            Phase::Drained => {
                return Err(InternalError::projector_invariant(
                    "row pushed after the group table was drained",
                )
                .into());
            }
        };

        for expression in &mut state.expressions {
            expression.set_next_row(row)?;
        }

        match grouper.fold(&state.expressions, &self.ram) {
            Ok(()) => {
                state.rows_grouped += 1;
                Ok(true)
            }
            // A failed fold may leave the hit group partly folded, so the
            // table is never emitted after it.
            Err(err) => {
                state.phase = Phase::Aborted;
                if let Some(downstream) = state.downstream.take() {
                    downstream.upstream_failed(err.clone());
                }
                Err(err)
            }
        }
    }

    fn register_upstream(&self, _: &dyn ProjectorUpstream) {
        self.remaining_upstreams.fetch_add(1, Ordering::SeqCst);
    }

    fn upstream_finished(&self) -> Result<(), GroupError> {
        let mut state = self.lock()?;
        if !self.release_upstream() {
            return Ok(());
        }

        self.drain(&mut state)
    }

    fn upstream_failed(&self, error: GroupError) {
        let mut state = self.lock_recovered();
        if self.release_upstream() {
            debug!("last upstream failed, discarding group table: {error}");
            state.phase = Phase::Aborted;
            if let Some(downstream) = state.downstream.take() {
                downstream.upstream_failed(error);
            }
            return;
        }

        debug!("latching upstream failure until remaining upstreams finish: {error}");
        if self.failure.set(error).is_ok() {
            record(MetricsEvent::UpstreamFailureLatched);
        }
    }
}

impl ProjectorUpstream for GroupingProjector {
    fn downstream(&self, downstream: Arc<dyn Projector>) {
        downstream.register_upstream(self);
        self.lock_recovered().downstream = Some(downstream);
    }
}
