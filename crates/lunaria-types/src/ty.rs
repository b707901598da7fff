//! Single-value types
//!
//! The types form a tree rooted at `Any`:
//!
//! ```text
//! Any
//! ├── Nil
//! ├── Boolean
//! ├── Number
//! │   ├── Integer
//! │   └── Float
//! ├── String
//! ├── Table
//! ├── Function
//! └── Dynamic
//! ```
//!
//! There is no bottom element, so two incomparable types have no meet.
//! `Dynamic` is the gradual type: it sits under `Any` for subtyping but is
//! consistent with every other type.

use crate::order::PartialOrdering;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type of a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Any,
    Nil,
    Boolean,
    Number,
    Integer,
    Float,
    String,
    Table,
    Function,
    Dynamic,
}

impl ValueType {
    /// Immediate supertype, `None` for `Any`
    pub fn parent(self) -> Option<ValueType> {
        match self {
            ValueType::Any => None,
            ValueType::Integer | ValueType::Float => Some(ValueType::Number),
            _ => Some(ValueType::Any),
        }
    }

    /// Reflexive subtyping
    pub fn is_subtype_of(self, that: ValueType) -> bool {
        let mut current = Some(self);
        while let Some(t) = current {
            if t == that {
                return true;
            }
            current = t.parent();
        }
        false
    }

    /// Statically known to be a number of some representation
    pub fn is_numeric(self) -> bool {
        self.is_subtype_of(ValueType::Number)
    }

    /// Least upper bound
    pub fn join(self, that: ValueType) -> ValueType {
        if self.is_subtype_of(that) {
            that
        } else if that.is_subtype_of(self) {
            self
        } else {
            // Any has no parent but every type is a subtype of Any,
            // so the first two branches always fire before we run out
            self.parent().unwrap_or(ValueType::Any).join(that)
        }
    }

    /// Greatest lower bound, if one exists
    pub fn meet(self, that: ValueType) -> Option<ValueType> {
        if self.is_subtype_of(that) {
            Some(self)
        } else if that.is_subtype_of(self) {
            Some(that)
        } else {
            None
        }
    }

    /// Compare two types in the subtyping order
    pub fn compare(self, that: ValueType) -> PartialOrdering {
        if self == that {
            PartialOrdering::Equal
        } else if self.is_subtype_of(that) {
            PartialOrdering::Lesser
        } else if that.is_subtype_of(self) {
            PartialOrdering::Greater
        } else {
            PartialOrdering::NotComparable
        }
    }

    /// Gradual consistency: equal, or either side is `Dynamic`
    pub fn is_consistent_with(self, that: ValueType) -> bool {
        self == that || self == ValueType::Dynamic || that == ValueType::Dynamic
    }

    /// Gradual consistent subtyping
    pub fn is_consistent_subtype_of(self, that: ValueType) -> bool {
        self == ValueType::Dynamic || that == ValueType::Dynamic || self.is_subtype_of(that)
    }

    /// Single-character tag used in compact signatures
    pub fn tag(self) -> char {
        match self {
            ValueType::Any => 'A',
            ValueType::Nil => '-',
            ValueType::Boolean => 'B',
            ValueType::Number => 'N',
            ValueType::Integer => 'i',
            ValueType::Float => 'f',
            ValueType::String => 'S',
            ValueType::Table => 'T',
            ValueType::Function => 'F',
            ValueType::Dynamic => '?',
        }
    }

    /// All types, useful for exhaustive checks
    pub const ALL: [ValueType; 10] = [
        ValueType::Any,
        ValueType::Nil,
        ValueType::Boolean,
        ValueType::Number,
        ValueType::Integer,
        ValueType::Float,
        ValueType::String,
        ValueType::Table,
        ValueType::Function,
        ValueType::Dynamic,
    ];
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Any => "any",
            ValueType::Nil => "nil",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Table => "table",
            ValueType::Function => "function",
            ValueType::Dynamic => "dynamic",
        };
        write!(f, "{}", name)
    }
}
