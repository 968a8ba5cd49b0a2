//! Module: projector
//! Responsibility: the push-based pipeline protocol between row producers
//! and row consumers, plus the stages built on it.
//! Does not own: thread scheduling; producers drive the call chain.
//! Boundary: every stage talks to its neighbours only through `Projector`
//! and `ProjectorUpstream`.

mod collecting;
mod grouping;
mod source;

pub use collecting::CollectingProjector;
pub use grouping::GroupingProjector;
pub use source::RowSource;

use crate::{error::GroupError, row::Row};
use std::sync::Arc;

///
/// Projector
///
/// Consumer side of the pipeline protocol.
///
/// Calls are cooperative and synchronous. A projector may receive rows from
/// several producers at once; implementations serialize internally.
///

pub trait Projector: Send + Sync {
    /// Prepare for rows. Projectors with no registered producers complete here.
    fn start_projection(&self) -> Result<(), GroupError>;

    /// Consume one row. `Ok(false)` asks the producer to stop sending.
    fn set_next_row(&self, row: &Row) -> Result<bool, GroupError>;

    /// Count one more producer that will report completion or failure.
    fn register_upstream(&self, upstream: &dyn ProjectorUpstream);

    /// One producer has sent its last row.
    fn upstream_finished(&self) -> Result<(), GroupError>;

    /// One producer has failed and will send no more rows.
    fn upstream_failed(&self, error: GroupError);
}

///
/// ProjectorUpstream
///
/// Producer side of the pipeline protocol.
///

pub trait ProjectorUpstream: Send + Sync {
    /// Attach `downstream` as the consumer of this producer's rows.
    ///
    /// Implementations also register themselves as one of its upstreams.
    fn downstream(&self, downstream: Arc<dyn Projector>);
}
