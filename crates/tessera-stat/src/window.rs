//! Window entries and per-key aggregates.

use serde::{Deserialize, Serialize};

/// One observation in the sliding window.
///
/// The window is shared by all keys and ordered by `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    /// Monotonic sequence id assigned by `push`.
    pub seq: u64,
    /// Statistics key the value belongs to.
    pub key: String,
    /// Observed value.
    pub value: f64,
}

/// Running aggregate for one key over its surviving window entries.
///
/// A key whose count drops to zero is removed from the engine, which is
/// the same as resetting every field to zero.
///
/// # Example
///
/// ```
/// use tessera_stat::StatVal;
///
/// let mut val = StatVal::default();
/// val.add(2.0);
/// val.add(4.0);
/// assert_eq!(val.n, 2);
/// assert_eq!(val.max, 4.0);
/// assert_eq!(val.min, 2.0);
/// assert_eq!(val.stddev(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatVal {
    /// Number of surviving observations.
    pub n: usize,
    /// Sum of surviving values.
    pub sum: f64,
    /// Sum of squared surviving values.
    pub sum_of_squares: f64,
    /// Largest surviving value.
    pub max: f64,
    /// Smallest surviving value.
    pub min: f64,
}

impl StatVal {
    /// Folds a new observation in.
    pub fn add(&mut self, value: f64) {
        self.n += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
        if self.n == 1 {
            self.max = value;
            self.min = value;
        } else {
            self.max = self.max.max(value);
            self.min = self.min.min(value);
        }
    }

    /// Takes an evicted observation out.
    ///
    /// `surviving` yields the values still in the window for this key. It
    /// is only walked when the evicted value was the current max or min;
    /// every aggregate is then rebuilt from the survivors, so a large
    /// extreme leaves no rounding error behind in `sum_of_squares`.
    pub fn rem<I>(&mut self, value: f64, surviving: I)
    where
        I: Iterator<Item = f64>,
    {
        self.n = self.n.saturating_sub(1);
        if self.n == 0 {
            *self = StatVal::default();
            return;
        }
        if self.max == value || self.min == value {
            self.rescan(surviving);
            return;
        }
        self.sum -= value;
        self.sum_of_squares = (self.sum_of_squares - value * value).max(0.0);
    }

    fn rescan<I>(&mut self, surviving: I)
    where
        I: Iterator<Item = f64>,
    {
        let (mut sum, mut sum_of_squares) = (0.0, 0.0);
        let (mut max, mut min) = (f64::NEG_INFINITY, f64::INFINITY);
        for v in surviving {
            sum += v;
            sum_of_squares += v * v;
            max = max.max(v);
            min = min.min(v);
        }
        self.sum = sum;
        self.sum_of_squares = sum_of_squares;
        self.max = max;
        self.min = min;
    }

    /// Population standard deviation; `0.0` when empty.
    pub fn stddev(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = self.n as f64;
        let mean = self.sum / n;
        (self.sum_of_squares / n - mean * mean).max(0.0).sqrt()
    }
}
