//! Identity comparisons between values.
//!
//! Composites compare by node identity. A wrapper is not identical to its
//! target; callers unwrap first when that is what they mean.

use crate::value::Value;

/// `Object.is`: NaN equals NaN, `+0` differs from `-0`.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
        }
        _ => same_reference(a, b),
    }
}

/// Like [`same_value`] but `+0` equals `-0`. Used for set membership and
/// `includes`.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x.is_nan() && y.is_nan()) || x == y,
        _ => same_reference(a, b),
    }
}

/// `===`: NaN never matches. Used by `index_of` and `last_index_of`.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        _ => same_reference(a, b),
    }
}

fn same_reference(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => x.ptr_eq(y),
        (Value::Node(x), Value::Node(y)) => x.ptr_eq(y),
        (Value::Observed(x), Value::Observed(y)) => x.ptr_eq(y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Node;

    #[test]
    fn test_number_semantics() {
        let nan = Value::Number(f64::NAN);
        let zero = Value::Number(0.0);
        let neg_zero = Value::Number(-0.0);

        assert!(same_value(&nan, &nan));
        assert!(!same_value(&zero, &neg_zero));
        assert!(same_value_zero(&zero, &neg_zero));
        assert!(same_value_zero(&nan, &nan));
        assert!(!strict_equals(&nan, &nan));
        assert!(strict_equals(&zero, &neg_zero));
    }

    #[test]
    fn test_nodes_compare_by_identity() {
        let a = Node::object();
        let b = Node::object();
        assert!(same_value(&Value::Node(a.clone()), &Value::Node(a.clone())));
        assert!(!same_value(&Value::Node(a), &Value::Node(b)));
        assert!(!same_value(&Value::from("1"), &Value::from(1)));
    }
}
