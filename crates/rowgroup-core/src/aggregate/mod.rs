//! Module: aggregate
//! Responsibility: the aggregate-function contract and the collector that
//! binds one function to its inputs.
//! Does not own: group tables or key handling.
//! Boundary: grouping projectors start, fold, and finish states only through
//! `AggregationCollector`.

mod functions;


pub use functions::{AvgFunction, CountFunction, ExtremaFunction, SumFunction};

use crate::{
    breaker::RamAccountingContext,
    error::{ConfigurationError, GroupError},
    expr::{CollectExpression, Input},
    value::Value,
};
use std::{fmt, sync::Arc};

///
/// AggregateFunction
///
/// Black-box aggregate implementation. Functions are stateless; every group
/// gets its own `AggregationState` from `new_state`.
///

pub trait AggregateFunction: fmt::Debug + Send + Sync {
    /// Stable function name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Return whether this function accepts `inputs` arguments.
    fn accepts_inputs(&self, inputs: usize) -> bool;

    /// Build one fresh accumulator, charging its footprint to `ram`.
    fn new_state(&self, ram: &RamAccountingContext)
    -> Result<Box<dyn AggregationState>, GroupError>;
}

///
/// AggregationState
///
/// Mutable accumulator owned by exactly one (group, aggregate) slot.
///

pub trait AggregationState: fmt::Debug + Send {
    /// Fold one row's resolved arguments into this accumulator.
    fn reduce(&mut self, args: &[&Value], ram: &RamAccountingContext) -> Result<(), GroupError>;

    /// Produce the finished value for this accumulator.
    fn terminate(&self) -> Value;
}

///
/// AggregateKind
///
/// Built-in aggregate selector used by callers that do not bring their own
/// function implementations.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AggregateKind {
    Avg,
    Count,
    Max,
    Min,
    Sum,
}

impl AggregateKind {
    /// Resolve the shared function implementation for this kind.
    #[must_use]
    pub fn function(self) -> Arc<dyn AggregateFunction> {
        match self {
            Self::Avg => Arc::new(AvgFunction),
            Self::Count => Arc::new(CountFunction),
            Self::Max => Arc::new(ExtremaFunction::max()),
            Self::Min => Arc::new(ExtremaFunction::min()),
            Self::Sum => Arc::new(SumFunction),
        }
    }
}

///
/// AggregationContext
///
/// One output aggregate column as handed over by planning: the function
/// plus the inputs it reads.
///

#[derive(Clone, Debug)]
pub struct AggregationContext {
    function: Arc<dyn AggregateFunction>,
    inputs: Vec<Input>,
}

impl AggregationContext {
    #[must_use]
    pub fn new(function: Arc<dyn AggregateFunction>, inputs: Vec<Input>) -> Self {
        Self { function, inputs }
    }

    /// Build one context for a built-in aggregate.
    #[must_use]
    pub fn of(kind: AggregateKind, inputs: Vec<Input>) -> Self {
        Self::new(kind.function(), inputs)
    }

    #[must_use]
    pub fn function(&self) -> &dyn AggregateFunction {
        self.function.as_ref()
    }

    #[must_use]
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }
}

///
/// AggregationCollector
///
/// Binds one aggregate function to its resolved inputs. Collectors hold no
/// accumulator themselves; the group table owns every state and hands it to
/// the collector for each fold and for the final finish step.
///

#[derive(Debug)]
pub struct AggregationCollector {
    function: Arc<dyn AggregateFunction>,
    inputs: Vec<Input>,
}

impl AggregationCollector {
    /// Validate one aggregation context against the bound collect expressions.
    pub fn new(
        context: &AggregationContext,
        expressions: usize,
    ) -> Result<Self, ConfigurationError> {
        let function = Arc::clone(&context.function);
        if !function.accepts_inputs(context.inputs.len()) {
            return Err(ConfigurationError::AggregateArity {
                function: function.name(),
                found: context.inputs.len(),
            });
        }
        for input in &context.inputs {
            input.validate(expressions)?;
        }

        Ok(Self {
            function,
            inputs: context.inputs.clone(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.function.name()
    }

    /// Start one fresh accumulator for a newly observed group.
    pub fn start_collect(
        &self,
        ram: &RamAccountingContext,
    ) -> Result<Box<dyn AggregationState>, GroupError> {
        self.function.new_state(ram)
    }

    /// Fold the current row, as seen by `expressions`, into `state`.
    pub fn process_row(
        &self,
        state: &mut dyn AggregationState,
        expressions: &[Box<dyn CollectExpression>],
        ram: &RamAccountingContext,
    ) -> Result<(), GroupError> {
        let args = self
            .inputs
            .iter()
            .map(|input| input.resolve(expressions))
            .collect::<Vec<_>>();

        state.reduce(&args, ram)
    }

    /// Finish one accumulator into its output value.
    #[must_use]
    pub fn finish_collect(&self, state: &dyn AggregationState) -> Value {
        state.terminate()
    }
}
