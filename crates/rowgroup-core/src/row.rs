use crate::value::Value;
use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};

///
/// Row
///
/// Ordered, fixed-arity sequence of column values.
/// Rows are consumed positionally by collect expressions; `Row` does not
/// expose `DerefMut` so a row pushed downstream is never edited in place.
///

#[repr(transparent)]
#[derive(Clone, Debug, Default, Deref, Deserialize, Eq, Hash, IntoIterator, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(#[into_iterator(owned, ref)] Vec<Value>);

impl Row {
    /// Build a row from its column values.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Return the column at `index`, if present.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Consume the row and return its column values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Row {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build a [`Row`] from expressions convertible into [`Value`].
#[macro_export]
macro_rules! row {
    () => {
        $crate::row::Row::default()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::row::Row::new(vec![$($crate::value::Value::from($value)),+])
    };
}

///
/// TESTS
///
