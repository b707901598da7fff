//! Primitive arithmetic
//!
//! Two integers stay in the integer domain with wrapping overflow; anything
//! else involving a float is computed in floats. `/` and `^` always produce
//! floats. Floor division and modulo round toward negative infinity.

use crate::error::LuaError;
use crate::metatables::Event;
use crate::value::{Number, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    IDiv,
    /// Unary minus; the operand is passed twice
    Unm,
}

impl ArithOp {
    /// Metamethod event consulted for non-numeric operands
    pub fn event(self) -> Event {
        match self {
            ArithOp::Add => Event::Add,
            ArithOp::Sub => Event::Sub,
            ArithOp::Mul => Event::Mul,
            ArithOp::Div => Event::Div,
            ArithOp::Mod => Event::Mod,
            ArithOp::Pow => Event::Pow,
            ArithOp::IDiv => Event::IDiv,
            ArithOp::Unm => Event::Unm,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
            ArithOp::Pow => "^",
            ArithOp::IDiv => "//",
            ArithOp::Unm => "-",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Apply `op` if both operands are numbers; `None` means a metamethod is needed
pub fn raw_arithmetic(op: ArithOp, a: &Value, b: &Value) -> Option<Result<Value, LuaError>> {
    let x = a.to_number()?;
    let y = b.to_number()?;
    Some(apply(op, x, y).map(Value::from))
}

/// Apply `op` to two numbers
pub fn apply(op: ArithOp, a: Number, b: Number) -> Result<Number, LuaError> {
    match (a, b) {
        (Number::Integer(x), Number::Integer(y)) => integer_op(op, x, y),
        _ => Ok(Number::Float(float_op(op, a.as_float(), b.as_float()))),
    }
}

fn integer_op(op: ArithOp, x: i64, y: i64) -> Result<Number, LuaError> {
    let result = match op {
        ArithOp::Add => x.wrapping_add(y),
        ArithOp::Sub => x.wrapping_sub(y),
        ArithOp::Mul => x.wrapping_mul(y),
        ArithOp::Unm => x.wrapping_neg(),
        ArithOp::IDiv => {
            if y == 0 {
                return Err(LuaError::DivisionByZero { operator: "//" });
            }
            floor_div(x, y)
        }
        ArithOp::Mod => {
            if y == 0 {
                return Err(LuaError::DivisionByZero { operator: "%" });
            }
            floor_mod(x, y)
        }
        ArithOp::Div | ArithOp::Pow => {
            return Ok(Number::Float(float_op(op, x as f64, y as f64)));
        }
    };
    Ok(Number::Integer(result))
}

fn floor_div(x: i64, y: i64) -> i64 {
    let q = x.wrapping_div(y);
    if x.wrapping_rem(y) != 0 && ((x ^ y) < 0) {
        q - 1
    } else {
        q
    }
}

fn floor_mod(x: i64, y: i64) -> i64 {
    let r = x.wrapping_rem(y);
    if r != 0 && ((r ^ y) < 0) {
        r + y
    } else {
        r
    }
}

fn float_op(op: ArithOp, x: f64, y: f64) -> f64 {
    match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
        ArithOp::Pow => x.powf(y),
        ArithOp::IDiv => (x / y).floor(),
        ArithOp::Unm => -x,
        ArithOp::Mod => {
            if y.is_infinite() && x.is_finite() {
                if (x >= 0.0) == (y > 0.0) {
                    x
                } else {
                    y
                }
            } else {
                let m = x % y;
                if m != 0.0 && ((m < 0.0) != (y < 0.0)) {
                    m + y
                } else {
                    m
                }
            }
        }
    }
}
