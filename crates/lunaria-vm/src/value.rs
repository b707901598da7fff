//! Runtime values
//!
//! Tables and capture cells are reference-counted and interior-mutable, so
//! cloning a `Value` is cheap and aliases the same object.

use crate::table::Table;
use crate::vm::closure::LuaClosure;
use lunaria_types::ValueType;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable table
pub type TableRef = Rc<RefCell<Table>>;

/// Shared capture cell, aliased between a frame and the closures that captured it
pub type Upvalue = Rc<RefCell<Value>>;

/// Index into the state's library registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuiltinId(pub u16);

/// Something that can be invoked without metamethod help
#[derive(Clone)]
pub enum Function {
    /// Compiled procedure plus its captured cells
    Closure(Rc<LuaClosure>),
    /// Library routine
    Builtin(BuiltinId),
}

impl Function {
    /// Identity comparison
    pub fn same(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Closure(a), Function::Closure(b)) => Rc::ptr_eq(a, b),
            (Function::Builtin(a), Function::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Closure(c) => write!(f, "<closure {}>", c.proc.name),
            Function::Builtin(id) => write!(f, "<builtin #{}>", id.0),
        }
    }
}

/// Coarse runtime type, used to key per-type metatables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
}

/// A number after coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_float(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => Value::Integer(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

/// A runtime value
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Rc<str>),
    Table(TableRef),
    Function(Function),
}

impl Value {
    /// Wrap a table
    pub fn table(table: Table) -> Self {
        Value::Table(Rc::new(RefCell::new(table)))
    }

    /// Wrap a library routine
    pub fn builtin(id: BuiltinId) -> Self {
        Value::Function(Function::Builtin(id))
    }

    /// Name of the value's type, as reported in errors and by `type()`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) | Value::Float(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::Function(_) => ValueKind::Function,
        }
    }

    /// Most precise static type of this exact value
    pub fn static_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Table(_) => ValueType::Table,
            Value::Function(_) => ValueType::Function,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `nil` and `false` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Numeric value, converting numeric strings
    pub fn to_number(&self) -> Option<Number> {
        match self {
            Value::Integer(i) => Some(Number::Integer(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Integer value, if the value represents one exactly
    pub fn as_integer(&self) -> Option<i64> {
        match self.to_number()? {
            Number::Integer(i) => Some(i),
            Number::Float(f) => float_to_integer(f),
        }
    }

    /// Primitive equality: numbers by value, strings by content, the rest by identity
    pub fn raw_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
                float_to_integer(*f) == Some(*i)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.same(b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equals(other)
    }
}

/// Exact float-to-integer conversion
pub fn float_to_integer(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if f.fract() == 0.0 && f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .ok()
            .map(|u| Number::Integer(u as i64));
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::Integer(i));
    }
    // Rust accepts "inf" and "nan" which are not numerals here
    if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    s.parse::<f64>().ok().map(Number::Float)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Function(Function::Closure(c)) => {
                write!(f, "function: {:p}", Rc::as_ptr(c))
            }
            Value::Function(Function::Builtin(id)) => write!(f, "builtin: #{}", id.0),
        }
    }
}
