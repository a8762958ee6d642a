//! SQL semantics for stored values: comparison, arithmetic and truthiness.
//!
//! Integer and bigint operands mix freely; the result widens to bigint when
//! either side is one. Any NULL operand yields NULL (or an unknown ordering).

use common::tuple::Value;
use std::cmp::Ordering;

pub trait ValueOps {
    /// Compares two values. NULLs and mismatched types compare as unknown.
    fn compare(&self, other: &Value) -> Option<Ordering>;

    fn add(&self, other: &Value) -> Option<Value>;

    fn subtract(&self, other: &Value) -> Option<Value>;

    fn multiply(&self, other: &Value) -> Option<Value>;

    /// Division by zero yields `None`.
    fn divide(&self, other: &Value) -> Option<Value>;

    /// Returns true for a non-zero integer. NULL and zero are both false.
    fn is_true(&self) -> bool;
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i as i64),
        Value::BigInt(i) => Some(*i),
        _ => None,
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    int_op: fn(i32, i32) -> Option<i32>,
    big_op: fn(i64, i64) -> Option<i64>,
) -> Option<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Some(Value::Null),
        (Value::Integer(a), Value::Integer(b)) => int_op(*a, *b).map(Value::Integer),
        _ => big_op(as_i64(left)?, as_i64(right)?).map(Value::BigInt),
    }
}

impl ValueOps for Value {
    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Varchar(a), Value::Varchar(b)) => Some(a.cmp(b)),
            _ => Some(as_i64(self)?.cmp(&as_i64(other)?)),
        }
    }

    fn add(&self, other: &Value) -> Option<Value> {
        arithmetic(self, other, i32::checked_add, i64::checked_add)
    }

    fn subtract(&self, other: &Value) -> Option<Value> {
        arithmetic(self, other, i32::checked_sub, i64::checked_sub)
    }

    fn multiply(&self, other: &Value) -> Option<Value> {
        arithmetic(self, other, i32::checked_mul, i64::checked_mul)
    }

    fn divide(&self, other: &Value) -> Option<Value> {
        arithmetic(self, other, i32::checked_div, i64::checked_div)
    }

    fn is_true(&self) -> bool {
        matches!(as_i64(self), Some(i) if i != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_width_arithmetic() {
        assert_eq!(Value::Integer(2).add(&Value::Integer(3)), Some(Value::Integer(5)));
        assert_eq!(Value::Integer(2).add(&Value::BigInt(3)), Some(Value::BigInt(5)));
        assert_eq!(Value::Integer(i32::MAX).add(&Value::Integer(1)), None);
        assert_eq!(Value::Integer(7).divide(&Value::Integer(0)), None);
        assert_eq!(Value::Null.multiply(&Value::Integer(4)), Some(Value::Null));
        assert_eq!(Value::Varchar("a".into()).add(&Value::Integer(1)), None);
    }

    #[test]
    fn test_comparison() {
        assert_eq!(Value::Integer(3).compare(&Value::BigInt(3)), Some(Ordering::Equal));
        assert_eq!(
            Value::Varchar("a".into()).compare(&Value::Varchar("b".into())),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
        assert_eq!(Value::Varchar("1".into()).compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Integer(1).is_true());
        assert!(Value::BigInt(-4).is_true());
        assert!(!Value::Integer(0).is_true());
        assert!(!Value::Null.is_true());
        assert!(!Value::Varchar("yes".into()).is_true());
    }
}
