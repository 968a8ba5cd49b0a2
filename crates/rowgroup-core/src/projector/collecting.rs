use crate::{
    error::GroupError,
    projector::{Projector, ProjectorUpstream},
    row::Row,
};
use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

///
/// CollectedState
///

#[derive(Debug, Default)]
struct CollectedState {
    rows: Vec<Row>,
    failures: Vec<GroupError>,
    finished: usize,
    started: bool,
}

///
/// CollectingProjector
///
/// Terminal consumer that keeps every row it accepts along with the
/// completion and failure signals it receives.
///
/// With a row limit it asks its producers to stop once the limit is reached.
///

#[derive(Debug, Default)]
pub struct CollectingProjector {
    limit: Option<usize>,
    upstreams: AtomicUsize,
    state: Mutex<CollectedState>,
}

impl CollectingProjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `limit` rows; the last accepted row returns `false`.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, CollectedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the rows accepted so far, in arrival order.
    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.lock().rows.clone()
    }

    /// Failures received from producers, in arrival order.
    #[must_use]
    pub fn failures(&self) -> Vec<GroupError> {
        self.lock().failures.clone()
    }

    /// Number of `upstream_finished` calls received.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.lock().finished
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    /// Number of producers that registered with this consumer.
    #[must_use]
    pub fn upstream_count(&self) -> usize {
        self.upstreams.load(Ordering::SeqCst)
    }
}

impl Projector for CollectingProjector {
    fn start_projection(&self) -> Result<(), GroupError> {
        self.lock().started = true;

        Ok(())
    }

    fn set_next_row(&self, row: &Row) -> Result<bool, GroupError> {
        let mut state = self.lock();
        if self.limit.is_some_and(|limit| state.rows.len() >= limit) {
            return Ok(false);
        }
        state.rows.push(row.clone());

        Ok(self.limit.is_none_or(|limit| state.rows.len() < limit))
    }

    fn register_upstream(&self, _: &dyn ProjectorUpstream) {
        self.upstreams.fetch_add(1, Ordering::SeqCst);
    }

    fn upstream_finished(&self) -> Result<(), GroupError> {
        self.lock().finished += 1;

        Ok(())
    }

    fn upstream_failed(&self, error: GroupError) {
        self.lock().failures.push(error);
    }
}

///
/// TESTS
///
