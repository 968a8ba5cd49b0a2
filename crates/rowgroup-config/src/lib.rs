//! Typed configuration for the grouping stage.
//!
//! Configuration is resolved once per query execution. Nothing here is read
//! per row; the core crate copies the values it needs into its own contexts.

use serde::Deserialize;
use thiserror::Error as ThisError;

///
/// CONSTANTS
///

/// Default memory ceiling for one grouping operation.
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 16 * 1024 * 1024;

/// Default allocation quantum used when rounding byte estimates.
pub const DEFAULT_ALLOCATION_QUANTUM: u64 = 8;

/// Default bucket count for row redistribution.
pub const DEFAULT_BUCKET_COUNT: u32 = 1;

/// Default accounting label reported by memory-limit failures.
pub const DEFAULT_LABEL: &str = "group-by";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to parse grouping config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("allocation_quantum must be a non-zero power of two, got {0}")]
    InvalidAllocationQuantum(u64),

    #[error("default_bucket_count must be positive")]
    ZeroBucketCount,

    #[error("label must not be empty")]
    EmptyLabel,
}

///
/// GroupingConfig
///
/// Hard limits and accounting policy for one grouping execution.
/// The ceiling is fixed for the lifetime of the query; there are no
/// per-component sub-budgets.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GroupingConfig {
    pub label: String,
    pub memory_limit_bytes: u64,
    pub allocation_quantum: u64,
    pub default_bucket_count: u32,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            allocation_quantum: DEFAULT_ALLOCATION_QUANTUM,
            default_bucket_count: DEFAULT_BUCKET_COUNT,
        }
    }
}

impl GroupingConfig {
    /// Build one config with an explicit memory ceiling and default policy.
    #[must_use]
    pub fn with_memory_limit(memory_limit_bytes: u64) -> Self {
        Self {
            memory_limit_bytes,
            ..Self::default()
        }
    }

    /// Parse and validate the `[grouping]` table of a TOML document.
    ///
    /// A document without a `[grouping]` table yields the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        file.grouping.validate()?;

        Ok(file.grouping)
    }

    /// Validate policy values that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.allocation_quantum.is_power_of_two() {
            return Err(ConfigError::InvalidAllocationQuantum(
                self.allocation_quantum,
            ));
        }
        if self.default_bucket_count == 0 {
            return Err(ConfigError::ZeroBucketCount);
        }
        if self.label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    grouping: GroupingConfig,
}

///
/// TESTS
///
