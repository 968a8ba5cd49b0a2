use crate::{
    error::{GroupError, InternalError},
    projector::{Projector, ProjectorUpstream},
    row::Row,
};
use log::warn;
use std::sync::{Arc, OnceLock};

///
/// RowSource
///
/// Producer that pushes a fixed row set to its downstream and then reports
/// completion, or the configured failure.
///

pub struct RowSource {
    rows: Vec<Row>,
    failure: Option<GroupError>,
    downstream: OnceLock<Arc<dyn Projector>>,
}

impl RowSource {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            failure: None,
            downstream: OnceLock::new(),
        }
    }

    /// Build a source that pushes `rows` and then reports `failure`.
    #[must_use]
    pub fn failing(rows: Vec<Row>, failure: GroupError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(rows)
        }
    }

    /// Push every row until the downstream refuses more, then report.
    ///
    /// Returns the number of rows the downstream accepted. A push error is
    /// reported downstream as this producer's failure and returned.
    pub fn run(&self) -> Result<usize, GroupError> {
        let Some(downstream) = self.downstream.get() else {
            return Err(InternalError::projector_invariant("row source has no downstream").into());
        };

        let mut sent = 0;
        for row in &self.rows {
            match downstream.set_next_row(row) {
                Ok(more) => {
                    sent += 1;
                    if !more {
                        break;
                    }
                }
                Err(err) => {
                    downstream.upstream_failed(err.clone());
                    return Err(err);
                }
            }
        }

        match &self.failure {
            Some(failure) => downstream.upstream_failed(failure.clone()),
            None => downstream.upstream_finished()?,
        }

        Ok(sent)
    }
}

impl ProjectorUpstream for RowSource {
    fn downstream(&self, downstream: Arc<dyn Projector>) {
        if self.downstream.set(Arc::clone(&downstream)).is_err() {
            warn!("row source already has a downstream; ignoring the new one");
            return;
        }

        downstream.register_upstream(self);
    }
}
