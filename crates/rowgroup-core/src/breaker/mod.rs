//! Module: breaker
//! Responsibility: query-scoped memory accounting and circuit breaking.
//! Does not own: what is charged or when; callers decide the byte estimates.
//! Boundary: one context per query execution, shared by `Arc` across every
//! projector, collector, and estimator that charges against the ceiling.

mod size;

pub use size::SizeEstimator;

use crate::obs::sink::{MetricsEvent, record};
use log::warn;
use rowgroup_config::{ConfigError, GroupingConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error as ThisError;

/// Allocation alignment used when no config overrides it.
pub const DEFAULT_ALLOCATION_QUANTUM: u64 = rowgroup_config::DEFAULT_ALLOCATION_QUANTUM;

///
/// CircuitBreakingError
///
/// Resource-limit failure raised when a charge pushes the accounted total
/// past the ceiling. Terminal for the query that raised it.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("grouping memory limit exceeded ({label}): attempted={attempted}, limit={limit}")]
pub struct CircuitBreakingError {
    pub label: String,
    pub attempted: u64,
    pub limit: u64,
}

///
/// RamAccountingContext
///
/// Running byte total plus a fixed ceiling for one query execution.
///
/// Charges are unconditional: the total grows even when the charge breaches
/// the ceiling, so every later charge fails too. The counter is never reset
/// while the query is running.
///

#[derive(Debug)]
pub struct RamAccountingContext {
    label: String,
    limit: u64,
    quantum: u64,
    used: AtomicU64,
    tripped: AtomicBool,
}

impl RamAccountingContext {
    /// Build one context with the default allocation quantum.
    #[must_use]
    pub fn new(label: impl Into<String>, limit: u64) -> Self {
        Self::with_quantum(label, limit, DEFAULT_ALLOCATION_QUANTUM)
    }

    /// Build one context with no practical ceiling, for callers that only
    /// want diagnostics.
    #[must_use]
    pub fn unbounded(label: impl Into<String>) -> Self {
        Self::new(label, u64::MAX)
    }

    /// Build one context from validated grouping configuration.
    pub fn from_config(config: &GroupingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self::with_quantum(
            config.label.clone(),
            config.memory_limit_bytes,
            config.allocation_quantum,
        ))
    }

    fn with_quantum(label: impl Into<String>, limit: u64, quantum: u64) -> Self {
        debug_assert!(
            quantum.is_power_of_two(),
            "allocation quantum must be a power of two"
        );

        Self {
            label: label.into(),
            limit,
            quantum,
            used: AtomicU64::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    /// Add `bytes` to the running total and fail if the ceiling is exceeded.
    ///
    /// The increment and the ceiling check observe the same atomic update,
    /// so concurrent charges can neither lose bytes nor slip past a breach.
    pub fn add_bytes(&self, bytes: u64) -> Result<(), CircuitBreakingError> {
        let attempted = self
            .used
            .fetch_add(bytes, Ordering::SeqCst)
            .saturating_add(bytes);
        if attempted <= self.limit {
            return Ok(());
        }

        if !self.tripped.swap(true, Ordering::SeqCst) {
            warn!(
                "memory ceiling breached for {}: attempted={attempted}, limit={}",
                self.label, self.limit
            );
        }
        record(MetricsEvent::CircuitBreak {
            attempted,
            limit: self.limit,
        });

        Err(CircuitBreakingError {
            label: self.label.clone(),
            attempted,
            limit: self.limit,
        })
    }

    /// Round one byte estimate up to the allocation quantum.
    #[must_use]
    pub const fn round_up(&self, bytes: u64) -> u64 {
        let mask = self.quantum - 1;

        match bytes.checked_add(mask) {
            Some(padded) => padded & !mask,
            None => u64::MAX & !mask,
        }
    }

    /// Current accounted total, for diagnostics only.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Return true once any charge has breached the ceiling.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

///
/// TESTS
///
