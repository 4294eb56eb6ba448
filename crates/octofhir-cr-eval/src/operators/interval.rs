//! Interval Operators

use crate::error::{EvalError, EvalResult};
use octofhir_cr_model::{Interval, Value};

/// Interval selector; null bounds are open-ended
pub fn interval(low: Value, low_closed: bool, high: Value, high_closed: bool) -> Value {
    let bound = |v: Value| (!v.is_null()).then(|| Box::new(v));
    Value::Interval(Interval {
        low: bound(low),
        low_closed,
        high: bound(high),
        high_closed,
    })
}

pub fn start(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Interval(i) => Ok(i.low.as_deref().cloned().unwrap_or(Value::Null)),
        other => Err(EvalError::type_mismatch("Interval", other.type_name())),
    }
}

pub fn end(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Interval(i) => Ok(i.high.as_deref().cloned().unwrap_or(Value::Null)),
        other => Err(EvalError::type_mismatch("Interval", other.type_name())),
    }
}

/// In: point membership in an interval or a list
pub fn contains(point: &Value, container: &Value) -> EvalResult<Value> {
    match container {
        Value::Null => Ok(Value::Null),
        Value::Interval(i) => Ok(i.contains(point).map_or(Value::Null, Value::Boolean)),
        Value::List(items) => {
            if point.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::Boolean(
                items.iter().any(|item| item.equals(point) == Some(true)),
            ))
        }
        other => Err(EvalError::type_mismatch("Interval or List", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_operators() {
        let range = interval(Value::Integer(1), true, Value::Integer(10), false);
        assert_eq!(start(&range).unwrap(), Value::Integer(1));
        assert_eq!(end(&range).unwrap(), Value::Integer(10));
        assert_eq!(contains(&Value::Integer(10), &range).unwrap(), Value::Boolean(false));
        assert_eq!(contains(&Value::Integer(5), &range).unwrap(), Value::Boolean(true));

        let list = Value::List(vec![Value::string("a"), Value::string("b")]);
        assert_eq!(contains(&Value::string("b"), &list).unwrap(), Value::Boolean(true));
        assert!(start(&Value::Integer(1)).is_err());
    }
}
