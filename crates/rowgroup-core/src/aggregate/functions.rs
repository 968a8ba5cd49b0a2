use crate::{
    aggregate::{AggregateFunction, AggregationState},
    breaker::RamAccountingContext,
    error::{GroupError, InternalError},
    value::{Value, strict_order_cmp},
};
use std::cmp::Ordering;

// Accumulator footprints charged when a state is created.
const COUNT_STATE_BYTES: u64 = 8;
const SUM_STATE_BYTES: u64 = 16;
const AVG_STATE_BYTES: u64 = 16;
const EXTREMA_STATE_BYTES: u64 = 16;

fn charge_state(ram: &RamAccountingContext, bytes: u64) -> Result<(), GroupError> {
    ram.add_bytes(ram.round_up(bytes))?;

    Ok(())
}

fn single_arg<'a>(name: &str, args: &[&'a Value]) -> Result<&'a Value, GroupError> {
    match args {
        [value] => Ok(value),
        _ => Err(InternalError::aggregate_internal(format!(
            "{name} expects exactly one argument, got {}",
            args.len()
        ))
        .into()),
    }
}

fn non_numeric(name: &str, value: &Value) -> GroupError {
    InternalError::aggregate_unsupported(format!("{name} cannot fold non-numeric value {value:?}"))
        .into()
}

///
/// CountFunction
///
/// `count(*)` with no inputs counts rows; `count(x)` counts non-null `x`.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CountFunction;

impl AggregateFunction for CountFunction {
    fn name(&self) -> &'static str {
        "count"
    }

    fn accepts_inputs(&self, inputs: usize) -> bool {
        inputs <= 1
    }

    fn new_state(
        &self,
        ram: &RamAccountingContext,
    ) -> Result<Box<dyn AggregationState>, GroupError> {
        charge_state(ram, COUNT_STATE_BYTES)?;

        Ok(Box::new(CountState { count: 0 }))
    }
}

#[derive(Debug)]
struct CountState {
    count: i64,
}

impl AggregationState for CountState {
    fn reduce(&mut self, args: &[&Value], _: &RamAccountingContext) -> Result<(), GroupError> {
        if args.first().is_none_or(|value| !value.is_null()) {
            self.count = self.count.saturating_add(1);
        }

        Ok(())
    }

    fn terminate(&self) -> Value {
        Value::Long(self.count)
    }
}

///
/// SumFunction
///
/// Sums integral inputs as `i64` (overflow is an error) and switches to
/// `f64` as soon as a double is folded. Nulls are skipped; an all-null
/// group sums to null.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct SumFunction;

impl AggregateFunction for SumFunction {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn accepts_inputs(&self, inputs: usize) -> bool {
        inputs == 1
    }

    fn new_state(
        &self,
        ram: &RamAccountingContext,
    ) -> Result<Box<dyn AggregationState>, GroupError> {
        charge_state(ram, SUM_STATE_BYTES)?;

        Ok(Box::new(SumState::Empty))
    }
}

#[derive(Debug)]
enum SumState {
    Empty,
    Integral(i64),
    Floating(f64),
}

impl AggregationState for SumState {
    #[allow(clippy::cast_precision_loss)]
    fn reduce(&mut self, args: &[&Value], _: &RamAccountingContext) -> Result<(), GroupError> {
        let value = single_arg("sum", args)?;
        if value.is_null() {
            return Ok(());
        }

        let next = match (&*self, value) {
            (Self::Empty, Value::Double(v)) => Self::Floating(*v),
            (Self::Integral(acc), Value::Double(v)) => Self::Floating(*acc as f64 + v),
            (Self::Floating(acc), v) => {
                Self::Floating(acc + v.as_f64().ok_or_else(|| non_numeric("sum", v))?)
            }
            (Self::Empty, v) => Self::Integral(v.as_i64().ok_or_else(|| non_numeric("sum", v))?),
            (Self::Integral(acc), v) => {
                let addend = v.as_i64().ok_or_else(|| non_numeric("sum", v))?;
                let total = acc.checked_add(addend).ok_or_else(|| {
                    GroupError::from(InternalError::aggregate_internal("sum overflowed i64"))
                })?;
                Self::Integral(total)
            }
        };
        *self = next;

        Ok(())
    }

    fn terminate(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Integral(total) => Value::Long(*total),
            Self::Floating(total) => Value::Double(*total),
        }
    }
}

///
/// AvgFunction
///
/// Arithmetic mean of non-null numeric inputs, as a double.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct AvgFunction;

impl AggregateFunction for AvgFunction {
    fn name(&self) -> &'static str {
        "avg"
    }

    fn accepts_inputs(&self, inputs: usize) -> bool {
        inputs == 1
    }

    fn new_state(
        &self,
        ram: &RamAccountingContext,
    ) -> Result<Box<dyn AggregationState>, GroupError> {
        charge_state(ram, AVG_STATE_BYTES)?;

        Ok(Box::new(AvgState { sum: 0.0, count: 0 }))
    }
}

#[derive(Debug)]
struct AvgState {
    sum: f64,
    count: u64,
}

impl AggregationState for AvgState {
    fn reduce(&mut self, args: &[&Value], _: &RamAccountingContext) -> Result<(), GroupError> {
        let value = single_arg("avg", args)?;
        if value.is_null() {
            return Ok(());
        }

        self.sum += value.as_f64().ok_or_else(|| non_numeric("avg", value))?;
        self.count += 1;

        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn terminate(&self) -> Value {
        if self.count == 0 {
            return Value::Null;
        }

        Value::Double(self.sum / self.count as f64)
    }
}

///
/// ExtremaFunction
///
/// `min` / `max` over orderable values. Variable-size winners are retained,
/// so growth of the retained payload is charged as it happens.
///

#[derive(Clone, Copy, Debug)]
pub struct ExtremaFunction {
    name: &'static str,
    replace_when: Ordering,
}

impl ExtremaFunction {
    #[must_use]
    pub const fn min() -> Self {
        Self {
            name: "min",
            replace_when: Ordering::Less,
        }
    }

    #[must_use]
    pub const fn max() -> Self {
        Self {
            name: "max",
            replace_when: Ordering::Greater,
        }
    }
}

impl AggregateFunction for ExtremaFunction {
    fn name(&self) -> &'static str {
        self.name
    }

    fn accepts_inputs(&self, inputs: usize) -> bool {
        inputs == 1
    }

    fn new_state(
        &self,
        ram: &RamAccountingContext,
    ) -> Result<Box<dyn AggregationState>, GroupError> {
        charge_state(ram, EXTREMA_STATE_BYTES)?;

        Ok(Box::new(ExtremaState {
            name: self.name,
            replace_when: self.replace_when,
            current: None,
        }))
    }
}

#[derive(Debug)]
struct ExtremaState {
    name: &'static str,
    replace_when: Ordering,
    current: Option<Value>,
}

impl AggregationState for ExtremaState {
    fn reduce(&mut self, args: &[&Value], ram: &RamAccountingContext) -> Result<(), GroupError> {
        let value = single_arg(self.name, args)?;
        if value.is_null() {
            return Ok(());
        }

        let retained = match &self.current {
            None => 0,
            Some(current) => {
                let ordering = strict_order_cmp(value, current).ok_or_else(|| {
                    GroupError::from(InternalError::aggregate_unsupported(format!(
                        "{} cannot compare {value:?} with {current:?}",
                        self.name
                    )))
                })?;
                if ordering != self.replace_when {
                    return Ok(());
                }
                current.payload_len()
            }
        };

        let growth = value.payload_len().saturating_sub(retained);
        if growth > 0 {
            ram.add_bytes(ram.round_up(growth as u64))?;
        }
        self.current = Some(value.clone());

        Ok(())
    }

    fn terminate(&self) -> Value {
        self.current.clone().unwrap_or(Value::Null)
    }
}
