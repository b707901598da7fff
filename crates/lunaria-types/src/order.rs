//! Partial-order comparison results

use serde::{Deserialize, Serialize};

/// Outcome of comparing two elements of a partially ordered set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartialOrdering {
    Equal,
    Lesser,
    Greater,
    NotComparable,
}

impl PartialOrdering {
    /// True unless the elements are incomparable
    pub fn is_defined(self) -> bool {
        self != PartialOrdering::NotComparable
    }

    /// Swap the direction of the comparison
    pub fn reverse(self) -> Self {
        match self {
            PartialOrdering::Lesser => PartialOrdering::Greater,
            PartialOrdering::Greater => PartialOrdering::Lesser,
            other => other,
        }
    }
}
