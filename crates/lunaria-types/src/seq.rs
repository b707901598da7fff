//! Value-sequence types
//!
//! A `TypeSeq` describes the static shape of something that produces zero or
//! more values: call arguments, call results, return values, or the whole
//! register file of a procedure. It is a fixed prefix of element types plus a
//! flag saying whether an unbounded tail of `Any` may follow.
//!
//! Reading past the fixed prefix yields `Any` when there is a tail and `Nil`
//! otherwise, which matches how missing values are observed at runtime.

use crate::order::PartialOrdering;
use crate::ty::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static shape of a sequence of values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeSeq {
    /// Types of the fixed prefix
    pub fixed: Vec<ValueType>,

    /// May an unbounded tail follow the prefix?
    pub has_tail: bool,
}

impl TypeSeq {
    /// Create a sequence type
    pub fn new(fixed: Vec<ValueType>, has_tail: bool) -> Self {
        Self { fixed, has_tail }
    }

    /// The empty sequence
    pub fn empty() -> Self {
        Self::new(Vec::new(), false)
    }

    /// Any number of values of any type
    pub fn vararg() -> Self {
        Self::new(Vec::new(), true)
    }

    /// A fixed-length sequence
    pub fn of(fixed: &[ValueType]) -> Self {
        Self::new(fixed.to_vec(), false)
    }

    /// Same prefix with an unbounded tail
    pub fn with_tail(&self) -> Self {
        Self::new(self.fixed.clone(), true)
    }

    /// Is only the tail present?
    pub fn is_tail_only(&self) -> bool {
        self.fixed.is_empty() && self.has_tail
    }

    /// Exact number of values, if statically known
    pub fn exact_len(&self) -> Option<usize> {
        if self.has_tail {
            None
        } else {
            Some(self.fixed.len())
        }
    }

    /// Type of the element at `idx`
    pub fn get(&self, idx: usize) -> ValueType {
        match self.fixed.get(idx) {
            Some(t) => *t,
            None if self.has_tail => ValueType::Any,
            None => ValueType::Nil,
        }
    }

    fn pointwise_len(&self, that: &TypeSeq) -> usize {
        self.fixed.len().max(that.fixed.len())
    }

    /// Is `that` at least as general as `self`?
    pub fn is_subsumed_by(&self, that: &TypeSeq) -> bool {
        for i in 0..self.pointwise_len(that) {
            if !self.get(i).is_subtype_of(that.get(i)) {
                return false;
            }
        }
        that.has_tail || !self.has_tail
    }

    /// Least upper bound
    pub fn join(&self, that: &TypeSeq) -> TypeSeq {
        let fixed = (0..self.pointwise_len(that))
            .map(|i| self.get(i).join(that.get(i)))
            .collect();
        TypeSeq::new(fixed, self.has_tail || that.has_tail)
    }

    /// Greatest lower bound; `None` when some position has no meet
    pub fn meet(&self, that: &TypeSeq) -> Option<TypeSeq> {
        let mut fixed = Vec::with_capacity(self.pointwise_len(that));
        for i in 0..self.pointwise_len(that) {
            fixed.push(self.get(i).meet(that.get(i))?);
        }
        Some(TypeSeq::new(fixed, self.has_tail && that.has_tail))
    }

    /// Pointwise comparison.
    ///
    /// `NotComparable` if some position is incomparable; otherwise the first
    /// position that differs decides, and the tails break ties. If
    /// `a.is_subsumed_by(b)` then `a.compare_pointwise(b)` is `Equal` or
    /// `Lesser`; the converse does not hold.
    pub fn compare_pointwise(&self, that: &TypeSeq) -> PartialOrdering {
        let mut result = None;

        for i in 0..self.pointwise_len(that) {
            let r = self.get(i).compare(that.get(i));
            if !r.is_defined() {
                return PartialOrdering::NotComparable;
            }
            if result.is_none() && r != PartialOrdering::Equal {
                result = Some(r);
            }
        }

        if let Some(r) = result {
            return r;
        }

        match (self.has_tail, that.has_tail) {
            (true, false) => PartialOrdering::Greater,
            (false, true) => PartialOrdering::Lesser,
            _ => PartialOrdering::Equal,
        }
    }

    /// Gradual consistency, position by position
    pub fn is_consistent_with(&self, that: &TypeSeq) -> bool {
        (0..self.pointwise_len(that)).all(|i| self.get(i).is_consistent_with(that.get(i)))
            && self.has_tail == that.has_tail
    }

    /// Gradual consistent subtyping, position by position
    pub fn is_consistent_subtype_of(&self, that: &TypeSeq) -> bool {
        (0..self.pointwise_len(that)).all(|i| self.get(i).is_consistent_subtype_of(that.get(i)))
            && (that.has_tail || !self.has_tail)
    }
}

impl fmt::Display for TypeSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.fixed {
            write!(f, "{}", t.tag())?;
        }
        if self.has_tail {
            write!(f, "+")?;
        }
        Ok(())
    }
}
