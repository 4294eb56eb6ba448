//! Logical Operators with three-valued logic

use crate::error::{EvalError, EvalResult};
use octofhir_cr_model::Value;

/// Logical operand: `Some(bool)` or `None` for null
pub fn as_logical(operator: &str, value: &Value) -> EvalResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        other => Err(EvalError::invalid_operand(
            operator,
            format!("expected Boolean, found {}", other.type_name()),
        )),
    }
}

/// Not: null stays null
pub fn not(value: &Value) -> EvalResult<Value> {
    Ok(as_logical("Not", value)?.map_or(Value::Null, |b| Value::Boolean(!b)))
}

/// Fold of And operands seen so far. `false` dominates, then null.
pub fn and_step(acc: Option<bool>, next: Option<bool>) -> Option<bool> {
    match (acc, next) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Fold of Or operands seen so far. `true` dominates, then null.
pub fn or_step(acc: Option<bool>, next: Option<bool>) -> Option<bool> {
    match (acc, next) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}
