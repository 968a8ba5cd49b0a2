use crate::{error::ConfigurationError, value::Value};
use rowgroup_primitives::{DataType, SizeClass};

/// Fixed header cost of one variable-size payload object (object header,
/// backing array header, offset and length fields).
const VARIABLE_OBJECT_OVERHEAD: u64 = 36;

/// Cost of a null slot in a variable-size column: one reference.
const NULL_REFERENCE_BYTES: u64 = 8;

///
/// SizeEstimator
///
/// Estimates the retained heap footprint of one key value.
/// Resolved once from the declared column type; estimation itself is a pure
/// function of that type and, for variable-size types, the content length.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SizeEstimator {
    Constant(u64),
    Variable { overhead: u64 },
}

impl SizeEstimator {
    /// Resolve the estimator for one declared type.
    ///
    /// Types that cannot be accounted fail here, not at estimation time.
    pub const fn for_type(data_type: DataType) -> Result<Self, ConfigurationError> {
        match data_type.size_class() {
            SizeClass::Fixed(width) => Ok(Self::Constant(width)),
            SizeClass::Variable => Ok(Self::Variable {
                overhead: VARIABLE_OBJECT_OVERHEAD,
            }),
            SizeClass::Unsupported => Err(ConfigurationError::UnsupportedSizeEstimate { data_type }),
        }
    }

    /// Estimate the retained size of one value in bytes.
    #[must_use]
    pub const fn estimate_size(&self, value: &Value) -> u64 {
        match self {
            Self::Constant(width) => *width,
            Self::Variable { .. } if value.is_null() => NULL_REFERENCE_BYTES,
            Self::Variable { overhead } => overhead.saturating_add(value.payload_len() as u64),
        }
    }
}

///
/// TESTS
///
