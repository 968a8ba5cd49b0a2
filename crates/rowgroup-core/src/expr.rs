//! Module: expr
//! Responsibility: per-row value extraction for key and aggregate inputs.
//! Does not own: expression planning; bound expressions arrive ready to use.
//! Boundary: projectors refresh every collect expression once per row, then
//! resolve `Input`s against the refreshed values.

use crate::{
    error::{ConfigurationError, InternalError},
    row::Row,
    value::Value,
};

///
/// CollectExpression
///
/// Re-evaluates itself against the current row before keys and aggregate
/// inputs read its value. Holds no state across rows except that value.
///

pub trait CollectExpression: Send {
    /// Reset per-run state before the first row arrives.
    fn start_collect(&mut self) {}

    /// Observe the next row and cache the value read from it.
    fn set_next_row(&mut self, row: &Row) -> Result<(), InternalError>;

    /// Return the value cached by the last `set_next_row`.
    fn value(&self) -> &Value;
}

///
/// ColumnExpression
///
/// Collect expression bound to one column position.
///

#[derive(Clone, Debug)]
pub struct ColumnExpression {
    position: usize,
    current: Value,
}

impl ColumnExpression {
    #[must_use]
    pub const fn new(position: usize) -> Self {
        Self {
            position,
            current: Value::Null,
        }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }
}

impl CollectExpression for ColumnExpression {
    fn start_collect(&mut self) {
        self.current = Value::Null;
    }

    fn set_next_row(&mut self, row: &Row) -> Result<(), InternalError> {
        let Some(value) = row.column(self.position) else {
            return Err(InternalError::expression_invariant(format!(
                "column {} is out of bounds for row of arity {}",
                self.position,
                row.len()
            )));
        };
        self.current.clone_from(value);

        Ok(())
    }

    fn value(&self) -> &Value {
        &self.current
    }
}

/// Build boxed column expressions for the given positions.
#[must_use]
pub fn columns(positions: impl IntoIterator<Item = usize>) -> Vec<Box<dyn CollectExpression>> {
    positions
        .into_iter()
        .map(|position| Box::new(ColumnExpression::new(position)) as Box<dyn CollectExpression>)
        .collect()
}

///
/// Input
///
/// Value source for a group key or an aggregate argument: either one of the
/// projector's collect expressions (by index) or a constant.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Input {
    Expression(usize),
    Literal(Value),
}

impl Input {
    /// Check this input against the number of bound collect expressions.
    pub const fn validate(&self, expressions: usize) -> Result<(), ConfigurationError> {
        match self {
            Self::Expression(index) if *index >= expressions => {
                Err(ConfigurationError::InputOutOfRange {
                    index: *index,
                    expressions,
                })
            }
            Self::Expression(_) | Self::Literal(_) => Ok(()),
        }
    }

    /// Resolve this input against refreshed collect expressions.
    ///
    /// Callers validate inputs at construction; an index that slipped past
    /// validation reads as null.
    #[must_use]
    pub fn resolve<'a>(&'a self, expressions: &'a [Box<dyn CollectExpression>]) -> &'a Value {
        match self {
            Self::Expression(index) => expressions
                .get(*index)
                .map_or(&Value::Null, |expression| expression.value()),
            Self::Literal(value) => value,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn column_expression_caches_current_row_value() {
        let mut expression = ColumnExpression::new(1);

        expression.set_next_row(&row!["a", 1]).expect("in bounds");
        assert_eq!(expression.value(), &Value::Int(1));

        expression.set_next_row(&row!["b", 2]).expect("in bounds");
        assert_eq!(expression.value(), &Value::Int(2));

        expression.start_collect();
        assert_eq!(expression.value(), &Value::Null);
    }

    #[test]
    fn column_expression_rejects_short_rows() {
        let mut expression = ColumnExpression::new(2);

        let err = expression
            .set_next_row(&row!["a"])
            .expect_err("column 2 is out of bounds");

        assert!(err.message.contains("out of bounds"), "{err}");
    }

    #[test]
    fn input_validation_checks_expression_index() {
        assert_eq!(Input::Expression(1).validate(2), Ok(()));
        assert_eq!(Input::Literal(Value::Int(0)).validate(0), Ok(()));
        assert_eq!(
            Input::Expression(2).validate(2),
            Err(ConfigurationError::InputOutOfRange {
                index: 2,
                expressions: 2
            })
        );
    }

    #[test]
    fn input_resolves_expressions_and_literals() {
        let mut expressions = columns([0, 1]);
        for expression in &mut expressions {
            expression.set_next_row(&row!["k", 5i64]).expect("in bounds");
        }

        assert_eq!(Input::Expression(1).resolve(&expressions), &Value::Long(5));
        assert_eq!(
            Input::Literal(Value::from("x")).resolve(&expressions),
            &Value::from("x")
        );
    }
}
