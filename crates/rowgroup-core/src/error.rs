use crate::breaker::CircuitBreakingError;
use rowgroup_primitives::DataType;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Cloneable so one failure can be latched by a projector and forwarded to
/// its downstream without losing the original message.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    /// Construct an InternalError from an explicit class and origin.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a projector-origin invariant violation.
    pub(crate) fn projector_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Projector,
            message,
        )
    }

    /// Construct a projector-origin internal error.
    pub(crate) fn projector_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Projector, message)
    }

    /// Construct an aggregate-origin unsupported error.
    pub(crate) fn aggregate_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Aggregate, message)
    }

    /// Construct an aggregate-origin internal error.
    pub(crate) fn aggregate_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Aggregate, message)
    }

    /// Construct an expression-origin invariant violation.
    pub(crate) fn expression_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Expression,
            message,
        )
    }

    /// Construct the failure a row producer reports about itself.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Upstream, ErrorOrigin::Upstream, message)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Internal,
    InvariantViolation,
    Unsupported,
    Upstream,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
            Self::Unsupported => "unsupported",
            Self::Upstream => "upstream",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Aggregate,
    Expression,
    Projector,
    Upstream,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Aggregate => "aggregate",
            Self::Expression => "expression",
            Self::Projector => "projector",
            Self::Upstream => "upstream",
        };
        write!(f, "{label}")
    }
}

///
/// ConfigurationError
///
/// Construction-time programmer errors. These are raised synchronously while
/// a projector or bucketing stage is built and are never retried.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ConfigurationError {
    #[error("number of key types ({key_types}) must match number of key inputs ({key_inputs})")]
    KeyArityMismatch { key_types: usize, key_inputs: usize },

    #[error("key type at index={index} is unresolved")]
    UnknownKeyType { index: usize },

    #[error("key type at index={index} is not hashable: {data_type}")]
    UnhashableKeyType { index: usize, data_type: DataType },

    #[error("size estimation is not supported for type {data_type}")]
    UnsupportedSizeEstimate { data_type: DataType },

    #[error("input references collect expression {index}, but only {expressions} are bound")]
    InputOutOfRange { index: usize, expressions: usize },

    #[error("aggregate {function} does not accept {found} input(s)")]
    AggregateArity { function: &'static str, found: usize },

    #[error("bucket count must be positive")]
    ZeroBuckets,
}

///
/// GroupError
///
/// GroupError is the typed error surface of the grouping stage.
/// Memory-limit failures stay explicit so resource guardrails never degrade
/// into generic internal errors on their way downstream.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum GroupError {
    #[error("invalid grouping configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("{0}")]
    CircuitBreaking(#[from] CircuitBreakingError),

    #[error("{0}")]
    Internal(#[from] InternalError),
}

impl GroupError {
    /// Construct the failure a row producer reports about itself.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Internal(InternalError::upstream(message))
    }

    /// Return true when this failure was raised by the memory accounting context.
    #[must_use]
    pub const fn is_circuit_breaking(&self) -> bool {
        matches!(self, Self::CircuitBreaking(_))
    }
}

///
/// TESTS
///
