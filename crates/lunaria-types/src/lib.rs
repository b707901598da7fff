//! Lunaria static types
//!
//! The lattice used by the compiler to describe what a register or a
//! multi-value expression may hold. Nothing here affects program behavior: the
//! compiler only uses these types to pick cheaper code when it can prove, for
//! example, that both operands of an addition are numbers.
//!
//! # Modules
//!
//! - `ty`: single-value types (`ValueType`) forming a tree under `Any`
//! - `seq`: value-sequence types (`TypeSeq`), a fixed prefix plus an optional tail
//! - `order`: results of partial-order comparisons

pub mod order;
pub mod seq;
pub mod ty;

// Re-exports
pub use order::PartialOrdering;
pub use seq::TypeSeq;
pub use ty::ValueType;
