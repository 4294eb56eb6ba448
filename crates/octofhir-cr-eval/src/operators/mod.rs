//! Operator implementations over evaluated operands
//!
//! - `arithmetic`: Add, Subtract, Multiply, Divide
//! - `comparison`: Equal, NotEqual, Less, LessOrEqual, Greater, GreaterOrEqual
//! - `logical`: And, Or, Not (three-valued)
//! - `list`: Exists, Count, First, Last, SingletonFrom
//! - `interval`: Start, End, In

pub mod arithmetic;
pub mod comparison;
pub mod interval;
pub mod list;
pub mod logical;
