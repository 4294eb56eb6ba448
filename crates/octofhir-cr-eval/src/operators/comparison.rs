//! Comparison Operators
//!
//! Null operands yield null. Operands that cannot be ordered against each
//! other are a type error.

use crate::error::{EvalError, EvalResult};
use octofhir_cr_model::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

/// Equal with null propagation
pub fn equal(left: &Value, right: &Value) -> Value {
    left.equals(right).map_or(Value::Null, Value::Boolean)
}

/// NotEqual with null propagation
pub fn not_equal(left: &Value, right: &Value) -> Value {
    left.equals(right).map_or(Value::Null, |eq| Value::Boolean(!eq))
}

/// Ordering comparison
pub fn compare(op: ComparisonOp, left: &Value, right: &Value) -> EvalResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let ordering = left
        .compare(right)
        .ok_or_else(|| EvalError::type_mismatch(left.type_name(), right.type_name()))?;
    let result = match op {
        ComparisonOp::Less => ordering == Ordering::Less,
        ComparisonOp::LessOrEqual => ordering != Ordering::Greater,
        ComparisonOp::Greater => ordering == Ordering::Greater,
        ComparisonOp::GreaterOrEqual => ordering != Ordering::Less,
    };
    Ok(Value::Boolean(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ComparisonOp::Less, 1, 2, true)]
    #[case(ComparisonOp::LessOrEqual, 2, 2, true)]
    #[case(ComparisonOp::Greater, 1, 2, false)]
    #[case(ComparisonOp::GreaterOrEqual, 3, 2, true)]
    fn test_integer_comparison(
        #[case] op: ComparisonOp,
        #[case] a: i64,
        #[case] b: i64,
        #[case] expected: bool,
    ) {
        assert_eq!(
            compare(op, &Value::Integer(a), &Value::Integer(b)).unwrap(),
            Value::Boolean(expected)
        );
    }

    #[test]
    fn test_null_and_mismatch() {
        assert_eq!(equal(&Value::Null, &Value::Integer(1)), Value::Null);
        assert_eq!(not_equal(&Value::string("a"), &Value::string("b")), Value::Boolean(true));
        assert!(compare(ComparisonOp::Less, &Value::Boolean(true), &Value::Integer(1)).is_err());
    }
}
