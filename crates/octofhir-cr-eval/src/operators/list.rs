//! List Operators

use crate::error::{EvalError, EvalResult};
use octofhir_cr_model::Value;

/// Exists: a list with at least one non-null element
pub fn exists(value: &Value) -> Value {
    Value::Boolean(match value {
        Value::Null => false,
        Value::List(items) => items.iter().any(|v| !v.is_null()),
        _ => true,
    })
}

/// Count of non-null elements
pub fn count(value: &Value) -> Value {
    Value::Integer(match value {
        Value::Null => 0,
        Value::List(items) => items.iter().filter(|v| !v.is_null()).count() as i64,
        _ => 1,
    })
}

pub fn first(value: Value) -> Value {
    match value {
        Value::List(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    }
}

pub fn last(value: Value) -> Value {
    match value {
        Value::List(items) => items.into_iter().last().unwrap_or(Value::Null),
        other => other,
    }
}

/// SingletonFrom: more than one element is an error
pub fn singleton_from(value: Value) -> EvalResult<Value> {
    match value {
        Value::List(mut items) => match items.len() {
            0 => Ok(Value::Null),
            1 => Ok(items.remove(0)),
            count => Err(EvalError::SingletonCardinality { count }),
        },
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_operators() {
        let list = Value::List(vec![Value::Integer(1), Value::Null, Value::Integer(3)]);
        assert_eq!(exists(&list), Value::Boolean(true));
        assert_eq!(exists(&Value::List(vec![Value::Null])), Value::Boolean(false));
        assert_eq!(count(&list), Value::Integer(2));
        assert_eq!(first(list.clone()), Value::Integer(1));
        assert_eq!(last(list.clone()), Value::Integer(3));
        assert!(matches!(
            singleton_from(list),
            Err(EvalError::SingletonCardinality { count: 3 })
        ));
        assert_eq!(singleton_from(Value::List(vec![])).unwrap(), Value::Null);
    }
}
