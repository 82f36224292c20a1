//! The statistics mix unit.

use serde::{Deserialize, Serialize};

/// A node's contribution to a mixing round: a value and the number of
/// observations behind it.
///
/// # Example
///
/// ```
/// use tessera_stat::StatDiff;
///
/// let a = StatDiff::new(1.0, 1);
/// let b = StatDiff::new(4.0, 3);
/// let merged = StatDiff::merge(&a, &b);
/// assert_eq!(merged, StatDiff::new(3.25, 4));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatDiff {
    /// The contributed value (an entropy estimate).
    pub value: f64,
    /// Observation count; the weight of `value` in a merge.
    pub count: u64,
}

impl StatDiff {
    /// Creates a diff.
    pub fn new(value: f64, count: u64) -> Self {
        Self { value, count }
    }

    /// Count-weighted average of the values, sum of the counts.
    ///
    /// Zero-count inputs carry no weight, so merging only empty diffs
    /// yields the empty diff.
    pub fn merge(lhs: &StatDiff, rhs: &StatDiff) -> StatDiff {
        let count = lhs.count.saturating_add(rhs.count);
        if count == 0 {
            return StatDiff::default();
        }
        let value = (lhs.value * lhs.count as f64 + rhs.value * rhs.count as f64) / count as f64;
        StatDiff { value, count }
    }

    /// Whether a merged diff can be applied: finite, non-negative value.
    pub fn is_consistent(&self) -> bool {
        self.value.is_finite() && self.value >= 0.0
    }
}
