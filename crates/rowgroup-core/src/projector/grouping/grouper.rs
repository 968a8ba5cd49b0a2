use crate::{
    aggregate::{AggregationCollector, AggregationState},
    breaker::{RamAccountingContext, SizeEstimator},
    error::GroupError,
    expr::{CollectExpression, Input},
    row::Row,
    value::Value,
};
use std::{collections::HashMap, hash::Hash};

// Map lookup working set (iterator objects plus hash and index integers).
const LOOKUP_OVERHEAD_BYTES: u64 = 32;
// Map entry header retained for each distinct group.
const ENTRY_OVERHEAD_BYTES: u64 = 24;
// Header of a retained multi-column key list.
const KEY_LIST_HEADER_BYTES: u64 = 12;
// List slot reference plus cached hash slot, per key column.
const KEY_ELEMENT_OVERHEAD_BYTES: u64 = 4;
// Array header of a materialized output array.
const ARRAY_HEADER_BYTES: u64 = 12;
// One reference slot in a materialized output array.
const ARRAY_SLOT_BYTES: u64 = 4;

type States = Vec<Box<dyn AggregationState>>;

///
/// KeyStrategy
///
/// Key extraction and key accounting for one grouping arity.
///

pub(super) trait KeyStrategy: Send {
    type Key: Eq + Hash + Send;

    /// Number of key columns written to each output row.
    fn arity(&self) -> usize;

    /// Read the group key for the current row.
    fn extract(&self, expressions: &[Box<dyn CollectExpression>]) -> Self::Key;

    /// Bytes retained by one newly inserted key, excluding the entry header.
    fn retained_bytes(&self, key: &Self::Key, ram: &RamAccountingContext) -> u64;

    /// Write the key columns of one output row, in declaration order.
    fn write_key(key: Self::Key, row: &mut Vec<Value>);
}

///
/// SingleKey
///
/// Table keyed directly on one value.
///

pub(super) struct SingleKey {
    input: Input,
    estimator: SizeEstimator,
}

impl SingleKey {
    pub(super) const fn new(input: Input, estimator: SizeEstimator) -> Self {
        Self { input, estimator }
    }
}

impl KeyStrategy for SingleKey {
    type Key = Value;

    fn arity(&self) -> usize {
        1
    }

    fn extract(&self, expressions: &[Box<dyn CollectExpression>]) -> Value {
        self.input.resolve(expressions).clone()
    }

    fn retained_bytes(&self, key: &Value, ram: &RamAccountingContext) -> u64 {
        ram.round_up(self.estimator.estimate_size(key))
    }

    fn write_key(key: Value, row: &mut Vec<Value>) {
        row.push(key);
    }
}

///
/// MultiKey
///
/// Table keyed on the ordered sequence of key values. Two keys are equal
/// iff every column is equal.
///

pub(super) struct MultiKey {
    columns: Vec<(Input, SizeEstimator)>,
}

impl MultiKey {
    pub(super) const fn new(columns: Vec<(Input, SizeEstimator)>) -> Self {
        Self { columns }
    }
}

impl KeyStrategy for MultiKey {
    type Key = Vec<Value>;

    fn arity(&self) -> usize {
        self.columns.len()
    }

    fn extract(&self, expressions: &[Box<dyn CollectExpression>]) -> Vec<Value> {
        self.columns
            .iter()
            .map(|(input, _)| input.resolve(expressions).clone())
            .collect()
    }

    fn retained_bytes(&self, key: &Vec<Value>, ram: &RamAccountingContext) -> u64 {
        self.columns
            .iter()
            .zip(key)
            .fold(KEY_LIST_HEADER_BYTES, |total, ((_, estimator), value)| {
                let element = ram
                    .round_up(
                        estimator
                            .estimate_size(value)
                            .saturating_add(KEY_ELEMENT_OVERHEAD_BYTES),
                    )
                    .saturating_add(KEY_ELEMENT_OVERHEAD_BYTES);
                total.saturating_add(element)
            })
    }

    fn write_key(key: Vec<Value>, row: &mut Vec<Value>) {
        row.extend(key);
    }
}

///
/// GroupTable
///
/// Distinct key -> one accumulator per aggregate, in declaration order.
/// Created empty, folded into once per row, and consumed by `finish`.
///

pub(super) struct GroupTable<S: KeyStrategy> {
    strategy: S,
    collectors: Vec<AggregationCollector>,
    groups: HashMap<S::Key, States>,
}

impl<S: KeyStrategy> GroupTable<S> {
    pub(super) fn new(strategy: S, collectors: Vec<AggregationCollector>) -> Self {
        Self {
            strategy,
            collectors,
            groups: HashMap::new(),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.groups.len()
    }

    // Fold the current row, as seen by the refreshed expressions.
    fn fold(
        &mut self,
        expressions: &[Box<dyn CollectExpression>],
        ram: &RamAccountingContext,
    ) -> Result<(), GroupError> {
        let key = self.strategy.extract(expressions);

        ram.add_bytes(LOOKUP_OVERHEAD_BYTES)?;
        if let Some(states) = self.groups.get_mut(&key) {
            for (collector, state) in self.collectors.iter().zip(states.iter_mut()) {
                collector.process_row(state.as_mut(), expressions, ram)?;
            }

            return Ok(());
        }

        let mut states = Vec::with_capacity(self.collectors.len());
        for collector in &self.collectors {
            let mut state = collector.start_collect(ram)?;
            collector.process_row(state.as_mut(), expressions, ram)?;
            states.push(state);
        }
        ram.add_bytes(
            self.strategy
                .retained_bytes(&key, ram)
                .saturating_add(ENTRY_OVERHEAD_BYTES),
        )?;
        self.groups.insert(key, states);

        Ok(())
    }

    // Materialize one output row per group, charging the output arrays first.
    fn finish(self, ram: &RamAccountingContext) -> Result<Vec<Row>, GroupError> {
        let arity = self.strategy.arity() + self.collectors.len();
        ram.add_bytes(ram.round_up(array_bytes(self.groups.len())))?;
        ram.add_bytes(ram.round_up(array_bytes(arity)))?;

        let collectors = self.collectors;
        let rows = self
            .groups
            .into_iter()
            .map(|(key, states)| {
                let mut values = Vec::with_capacity(arity);
                S::write_key(key, &mut values);
                values.extend(
                    collectors
                        .iter()
                        .zip(&states)
                        .map(|(collector, state)| collector.finish_collect(state.as_ref())),
                );

                Row::new(values)
            })
            .collect();

        Ok(rows)
    }
}

const fn array_bytes(slots: usize) -> u64 {
    ARRAY_HEADER_BYTES.saturating_add((slots as u64).saturating_mul(ARRAY_SLOT_BYTES))
}

///
/// Grouper
///
/// Strategy chosen once at construction from the key arity.
///

pub(super) enum Grouper {
    Single(GroupTable<SingleKey>),
    Multi(GroupTable<MultiKey>),
}

impl Grouper {
    /// Choose the strategy for the given key columns.
    pub(super) fn new(
        mut keys: Vec<(Input, SizeEstimator)>,
        collectors: Vec<AggregationCollector>,
    ) -> Self {
        if keys.len() == 1
            && let Some((input, estimator)) = keys.pop()
        {
            return Self::Single(GroupTable::new(SingleKey::new(input, estimator), collectors));
        }

        Self::Multi(GroupTable::new(MultiKey::new(keys), collectors))
    }

    pub(super) fn len(&self) -> usize {
        match self {
            Self::Single(table) => table.len(),
            Self::Multi(table) => table.len(),
        }
    }

    pub(super) fn fold(
        &mut self,
        expressions: &[Box<dyn CollectExpression>],
        ram: &RamAccountingContext,
    ) -> Result<(), GroupError> {
        match self {
            Self::Single(table) => table.fold(expressions, ram),
            Self::Multi(table) => table.fold(expressions, ram),
        }
    }

    pub(super) fn finish(self, ram: &RamAccountingContext) -> Result<Vec<Row>, GroupError> {
        match self {
            Self::Single(table) => table.finish(ram),
            Self::Multi(table) => table.finish(ram),
        }
    }
}
