#[macro_use]
mod macros;

use std::fmt;

///
/// DataType
///
/// Declared column type as handed over by the planning layer.
/// Grouping and size estimation resolve their behavior from this tag once,
/// at construction, and never re-inspect runtime values by type.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DataType {
    Boolean,
    Bytes,
    Double,
    Integer,
    Long,
    Object,
    Text,
    Undefined,
}

impl DataType {
    /// Return the full metadata descriptor for one data type.
    #[must_use]
    pub const fn metadata(self) -> DataTypeMetadata {
        data_type_registry!(metadata_from_registry, self)
    }

    /// Return the stable display name of this data type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        data_type_registry!(name_from_registry, self)
    }

    /// Return the coarse family this data type belongs to.
    #[must_use]
    pub const fn family(self) -> DataTypeFamily {
        self.metadata().family
    }

    /// Return whether the planner resolved this type to something concrete.
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.metadata().is_known
    }

    /// Return whether values of this type may be used as group or bucketing keys.
    #[must_use]
    pub const fn is_hashable(self) -> bool {
        self.metadata().is_hashable
    }

    /// Return how retained heap usage is estimated for this type.
    #[must_use]
    pub const fn size_class(self) -> SizeClass {
        self.metadata().size_class
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

///
/// DataTypeMetadata
///
/// Capability metadata shared by the grouping and accounting layers.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DataTypeMetadata {
    pub family: DataTypeFamily,
    pub is_known: bool,
    pub is_hashable: bool,
    pub size_class: SizeClass,
}

///
/// DataTypeFamily
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DataTypeFamily {
    Blob,
    Bool,
    Numeric,
    Object,
    Textual,
    Undefined,
}

///
/// SizeClass
///
/// Retained-size category of one data type.
/// `Fixed` carries the boxed footprint in bytes; `Variable` sizes scale with
/// content length; `Unsupported` types cannot be memory-accounted.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SizeClass {
    Fixed(u64),
    Variable,
    Unsupported,
}

/// Ordered list of all data types in registry order.
pub const ALL_DATA_TYPES: [DataType; 8] = data_type_registry!(all_types_from_registry);

///
/// TESTS
///
