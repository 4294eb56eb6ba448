//! Arithmetic Operators
//!
//! Integer operands stay integral; any decimal operand promotes the result to
//! decimal. Division always produces a decimal and yields null on a zero
//! divisor.

use crate::error::{EvalError, EvalResult};
use octofhir_cr_model::Value;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
        }
    }
}

/// Apply an arithmetic operator with null propagation
pub fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> EvalResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    if op == ArithmeticOp::Divide {
        let (a, b) = (to_decimal(op, left)?, to_decimal(op, right)?);
        if b.is_zero() {
            return Ok(Value::Null);
        }
        return a
            .checked_div(b)
            .map(Value::Decimal)
            .ok_or_else(|| EvalError::overflow(op.name()));
    }

    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                ArithmeticOp::Add => a.checked_add(*b),
                ArithmeticOp::Subtract => a.checked_sub(*b),
                ArithmeticOp::Multiply => a.checked_mul(*b),
                ArithmeticOp::Divide => None,
            };
            result
                .map(Value::Integer)
                .ok_or_else(|| EvalError::overflow(op.name()))
        }
        _ => {
            let (a, b) = (to_decimal(op, left)?, to_decimal(op, right)?);
            let result = match op {
                ArithmeticOp::Add => a.checked_add(b),
                ArithmeticOp::Subtract => a.checked_sub(b),
                ArithmeticOp::Multiply => a.checked_mul(b),
                ArithmeticOp::Divide => None,
            };
            result
                .map(Value::Decimal)
                .ok_or_else(|| EvalError::overflow(op.name()))
        }
    }
}

fn to_decimal(op: ArithmeticOp, value: &Value) -> EvalResult<Decimal> {
    match value {
        Value::Integer(i) => Ok(Decimal::from(*i)),
        Value::Decimal(d) => Ok(*d),
        other => Err(EvalError::invalid_operand(
            op.name(),
            format!("expected a number, found {}", other.type_name()),
        )),
    }
}
