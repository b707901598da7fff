//! Tables
//!
//! Positive integer keys that form a contiguous run from 1 live in the array
//! part; everything else goes to the hash part. Float keys with an exact integer
//! value are normalized to integers, so `t[1]` and `t[1.0]` are the same slot.

use crate::error::LuaError;
use crate::value::{float_to_integer, Function, TableRef, Value};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Normalized hash key
#[derive(Debug, Clone)]
enum TableKey {
    Boolean(bool),
    Integer(i64),
    /// Bit pattern of a non-integral, non-NaN float
    Float(u64),
    String(Rc<str>),
    Table(TableRef),
    Function(Function),
}

impl TableKey {
    /// `None` for keys that can never be stored (nil, NaN)
    fn from_value(value: &Value) -> Option<TableKey> {
        match value {
            Value::Nil => None,
            Value::Boolean(b) => Some(TableKey::Boolean(*b)),
            Value::Integer(i) => Some(TableKey::Integer(*i)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => Some(match float_to_integer(*f) {
                Some(i) => TableKey::Integer(i),
                // +0.0 and -0.0 are integral, so the bit pattern is canonical here
                None => TableKey::Float(f.to_bits()),
            }),
            Value::String(s) => Some(TableKey::String(s.clone())),
            Value::Table(t) => Some(TableKey::Table(t.clone())),
            Value::Function(f) => Some(TableKey::Function(f.clone())),
        }
    }
}

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TableKey::Boolean(a), TableKey::Boolean(b)) => a == b,
            (TableKey::Integer(a), TableKey::Integer(b)) => a == b,
            (TableKey::Float(a), TableKey::Float(b)) => a == b,
            (TableKey::String(a), TableKey::String(b)) => a == b,
            (TableKey::Table(a), TableKey::Table(b)) => Rc::ptr_eq(a, b),
            (TableKey::Function(a), TableKey::Function(b)) => a.same(b),
            _ => false,
        }
    }
}

impl Eq for TableKey {}

impl Hash for TableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TableKey::Boolean(b) => b.hash(state),
            TableKey::Integer(i) => i.hash(state),
            TableKey::Float(bits) => bits.hash(state),
            TableKey::String(s) => s.hash(state),
            TableKey::Table(t) => (Rc::as_ptr(t) as usize).hash(state),
            TableKey::Function(Function::Closure(c)) => (Rc::as_ptr(c) as usize).hash(state),
            TableKey::Function(Function::Builtin(id)) => id.hash(state),
        }
    }
}

/// A table with an optional metatable
#[derive(Debug, Default)]
pub struct Table {
    array: Vec<Value>,
    hash: HashMap<TableKey, Value>,
    metatable: Option<TableRef>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose array part holds `values` at keys 1..=n
    pub fn from_sequence(values: Vec<Value>) -> Self {
        let mut table = Self::new();
        for (i, v) in values.into_iter().enumerate() {
            table.set_int(i as i64 + 1, v);
        }
        table
    }

    /// Read without metamethods
    pub fn rawget(&self, key: &Value) -> Value {
        match TableKey::from_value(key) {
            Some(TableKey::Integer(i)) => self.get_int(i),
            Some(k) => self.hash.get(&k).cloned().unwrap_or(Value::Nil),
            None => Value::Nil,
        }
    }

    /// Read an integer key without metamethods
    pub fn get_int(&self, key: i64) -> Value {
        if key >= 1 && (key as u64) <= self.array.len() as u64 {
            return self.array[(key - 1) as usize].clone();
        }
        self.hash
            .get(&TableKey::Integer(key))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Read a string key without metamethods
    pub fn get_str(&self, key: &str) -> Value {
        self.rawget(&Value::from(key))
    }

    /// Write without metamethods
    pub fn rawset(&mut self, key: Value, value: Value) -> Result<(), LuaError> {
        match TableKey::from_value(&key) {
            Some(TableKey::Integer(i)) => {
                self.set_int(i, value);
                Ok(())
            }
            Some(k) => {
                if value.is_nil() {
                    self.hash.remove(&k);
                } else {
                    self.hash.insert(k, value);
                }
                Ok(())
            }
            None if key.is_nil() => Err(LuaError::Runtime("table index is nil".to_string())),
            None => Err(LuaError::Runtime("table index is NaN".to_string())),
        }
    }

    /// Write a string key without metamethods
    pub fn set_str(&mut self, key: &str, value: Value) {
        let key = TableKey::String(Rc::from(key));
        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
    }

    /// Write an integer key without metamethods
    pub fn set_int(&mut self, key: i64, value: Value) {
        let len = self.array.len() as i64;
        if key >= 1 && key <= len {
            self.array[(key - 1) as usize] = value;
            if key == len {
                while matches!(self.array.last(), Some(Value::Nil)) {
                    self.array.pop();
                }
            }
        } else if key == len + 1 && !value.is_nil() {
            self.hash.remove(&TableKey::Integer(key));
            self.array.push(value);
            self.migrate_from_hash();
        } else if value.is_nil() {
            self.hash.remove(&TableKey::Integer(key));
        } else {
            self.hash.insert(TableKey::Integer(key), value);
        }
    }

    /// Pull keys that now continue the array run out of the hash part
    fn migrate_from_hash(&mut self) {
        loop {
            let next = TableKey::Integer(self.array.len() as i64 + 1);
            match self.hash.remove(&next) {
                Some(v) => self.array.push(v),
                None => break,
            }
        }
    }

    /// Border of the sequence part, without metamethods
    pub fn rawlen(&self) -> i64 {
        self.array.len() as i64
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, metatable: Option<TableRef>) {
        self.metatable = metatable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_part() {
        let mut t = Table::new();
        t.rawset(Value::Integer(1), Value::from("a")).unwrap();
        t.rawset(Value::Integer(2), Value::from("b")).unwrap();
        assert_eq!(t.rawlen(), 2);
        assert_eq!(t.rawget(&Value::Float(2.0)), Value::from("b"));
    }

    #[test]
    fn test_out_of_order_inserts_migrate() {
        let mut t = Table::new();
        t.set_int(3, Value::Integer(30));
        t.set_int(2, Value::Integer(20));
        assert_eq!(t.rawlen(), 0);
        t.set_int(1, Value::Integer(10));
        assert_eq!(t.rawlen(), 3);
        assert_eq!(t.get_int(3), Value::Integer(30));
    }

    #[test]
    fn test_nil_shrinks_border() {
        let mut t = Table::from_sequence(vec![Value::Integer(1), Value::Integer(2)]);
        t.set_int(2, Value::Nil);
        assert_eq!(t.rawlen(), 1);
        t.set_int(1, Value::Nil);
        assert_eq!(t.rawlen(), 0);
    }

    #[test]
    fn test_hash_keys() {
        let mut t = Table::new();
        t.rawset(Value::from("k"), Value::Integer(1)).unwrap();
        t.rawset(Value::Float(0.5), Value::Integer(2)).unwrap();
        t.rawset(Value::Boolean(true), Value::Integer(3)).unwrap();
        assert_eq!(t.get_str("k"), Value::Integer(1));
        assert_eq!(t.rawget(&Value::Float(0.5)), Value::Integer(2));
        assert_eq!(t.rawget(&Value::Boolean(true)), Value::Integer(3));
        assert_eq!(t.rawget(&Value::Nil), Value::Nil);

        t.rawset(Value::from("k"), Value::Nil).unwrap();
        assert_eq!(t.get_str("k"), Value::Nil);
    }

    #[test]
    fn test_set_str() {
        let mut t = Table::new();
        t.set_str("name", Value::Integer(1));
        assert_eq!(t.rawget(&Value::from("name")), Value::Integer(1));
        t.set_str("name", Value::Nil);
        assert_eq!(t.get_str("name"), Value::Nil);
    }

    #[test]
    fn test_identity_keys() {
        let key = Value::table(Table::new());
        let mut t = Table::new();
        t.rawset(key.clone(), Value::Integer(1)).unwrap();
        assert_eq!(t.rawget(&key), Value::Integer(1));
        assert_eq!(t.rawget(&Value::table(Table::new())), Value::Nil);
    }

    #[test]
    fn test_invalid_keys() {
        let mut t = Table::new();
        assert!(t.rawset(Value::Nil, Value::Integer(1)).is_err());
        assert!(t.rawset(Value::Float(f64::NAN), Value::Integer(1)).is_err());
    }
}
