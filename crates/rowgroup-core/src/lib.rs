//! Row grouping, aggregation, and bucketing for a distributed SQL engine:
//! the push-based projector pipeline, memory-accounted group tables, and
//! fixed-seed row routing.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod aggregate;
pub mod breaker;
pub mod bucketing;
pub mod error;
pub mod expr;
pub mod obs;
pub mod projector;
pub mod row;
pub mod value;

// re-exports
pub use rowgroup_config::GroupingConfig;
pub use rowgroup_primitives::DataType;

///
/// Prelude
///
/// Prelude contains only pipeline vocabulary.
/// No errors, metrics, or accounting internals are re-exported here.
///

pub mod prelude {
    pub use crate::{
        aggregate::{AggregateKind, AggregationContext},
        expr::{CollectExpression, Input, columns},
        projector::{Projector, ProjectorUpstream},
        row::Row,
        value::Value,
    };
    pub use rowgroup_primitives::DataType;
}
