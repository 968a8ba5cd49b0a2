use crate::value::Value;
use std::cmp::Ordering;

/// Strict comparator for orderable values of the same kind.
///
/// Integral values compare across `Int`/`Long`; any numeric pair involving a
/// `Double` compares as `f64` with total ordering. Returns `None` for nulls
/// and mismatched kinds.
#[must_use]
pub fn strict_order_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            let (a, b) = (left.as_f64()?, right.as_f64()?);
            Some(a.total_cmp(&b))
        }
        _ => {
            let (a, b) = (left.as_i64()?, right.as_i64()?);
            Some(a.cmp(&b))
        }
    }
}
