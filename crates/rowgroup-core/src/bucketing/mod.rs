//! Module: bucketing
//! Responsibility: deterministic row-to-partition routing for distributed
//! grouping.
//! Does not own: transport of the partitioned rows.
//! Boundary: every node must route equal first-column values to the same
//! bucket, so hashing never depends on per-process random state.


use crate::{
    error::ConfigurationError,
    obs::sink::{MetricsEvent, record},
    row::Row,
    value::{Value, canonical_bits},
};
use mur3::murmurhash3_x86_32;
use rowgroup_config::{ConfigError, GroupingConfig};
use std::num::NonZeroU32;

/// Seed of the byte-sequence hash. Changing it reroutes every text key.
pub const BYTES_HASH_SEED: u32 = 1;

const TRUE_HASH: i32 = 1231;
const FALSE_HASH: i32 = 1237;

/// Routing hash of one value.
///
/// Integers hash to themselves, 64-bit values fold their halves, and byte
/// sequences (text or binary) use murmur3 x86_32 with a fixed seed.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn value_hash(value: &Value) -> i32 {
    match value {
        Value::Null => 0,
        Value::Bool(true) => TRUE_HASH,
        Value::Bool(false) => FALSE_HASH,
        Value::Int(value) => *value,
        Value::Long(value) => fold_u64(*value as u64),
        Value::Double(value) => fold_u64(canonical_bits(*value)),
        Value::Text(text) => murmurhash3_x86_32(text.as_bytes(), BYTES_HASH_SEED) as i32,
        Value::Bytes(bytes) => murmurhash3_x86_32(bytes, BYTES_HASH_SEED) as i32,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const fn fold_u64(bits: u64) -> i32 {
    (bits ^ (bits >> 32)) as u32 as i32
}

/// Bucket of one row among `buckets`, routed on its first column.
///
/// Absent rows, empty rows, and null first columns land in bucket 0.
#[must_use]
pub fn bucket_for_row(row: Option<&Row>, buckets: NonZeroU32) -> u32 {
    let Some(first) = row.and_then(|row| row.column(0)) else {
        return 0;
    };
    if first.is_null() {
        return 0;
    }

    let hash = match value_hash(first) {
        i32::MIN => 0,
        hash => hash.unsigned_abs(),
    };

    hash % buckets.get()
}

///
/// ModuloBucketing
///
/// Routes rows to one of a fixed number of buckets by first-column hash.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ModuloBucketing {
    buckets: NonZeroU32,
}

impl ModuloBucketing {
    /// Build a bucketing stage over `buckets` partitions.
    pub const fn new(buckets: u32) -> Result<Self, ConfigurationError> {
        match NonZeroU32::new(buckets) {
            Some(buckets) => Ok(Self { buckets }),
            None => Err(ConfigurationError::ZeroBuckets),
        }
    }

    /// Build a bucketing stage with the configured default bucket count.
    pub fn from_config(config: &GroupingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        NonZeroU32::new(config.default_bucket_count)
            .map(|buckets| Self { buckets })
            .ok_or(ConfigError::ZeroBucketCount)
    }

    #[must_use]
    pub const fn bucket_count(&self) -> u32 {
        self.buckets.get()
    }

    /// Bucket of one possibly absent row.
    #[must_use]
    pub fn bucket(&self, row: Option<&Row>) -> u32 {
        bucket_for_row(row, self.buckets)
    }

    /// Bucket of every row, in input order.
    pub fn buckets<'a>(&self, rows: impl IntoIterator<Item = &'a Row>) -> Vec<u32> {
        let buckets = rows
            .into_iter()
            .map(|row| self.bucket(Some(row)))
            .collect::<Vec<_>>();
        self.record_pass(buckets.len());

        buckets
    }

    /// Split rows into one vector per bucket, preserving input order within
    /// each bucket.
    pub fn partition(&self, rows: impl IntoIterator<Item = Row>) -> Vec<Vec<Row>> {
        let mut partitions = vec![Vec::new(); self.buckets.get() as usize];
        let mut routed = 0;
        for row in rows {
            let bucket = self.bucket(Some(&row)) as usize;
            partitions[bucket].push(row);
            routed += 1;
        }
        self.record_pass(routed);

        partitions
    }

    fn record_pass(&self, rows: usize) {
        record(MetricsEvent::RowsBucketed {
            rows: rows as u64,
            buckets: u64::from(self.buckets.get()),
        });
    }
}
