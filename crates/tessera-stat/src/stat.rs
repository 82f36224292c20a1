//! Stat: windowed per-key statistics engine.
//!
//! Stat keeps the last `window_size` observations (across all keys) in
//! insertion order and a running [`StatVal`] per key. When the window
//! overflows, the oldest observation is evicted and taken out of its
//! key's aggregate; if it was that key's max or min, the aggregate is
//! rebuilt from the key's surviving window entries.
//!
//! All state sits behind one `RwLock`. Mutations (`push`, `put_diff`,
//! `clear`, `unpack`) take the write lock, everything else the read lock,
//! each for exactly one call.

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tessera_core::{sync, LinearMixable, MixableHelper, TesseraError, Version};

use crate::diff::StatDiff;
use crate::window::{StatVal, WindowEntry};

/// Stat wrapped for the mixing scheduler.
pub type MixableStat = MixableHelper<Stat>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StatState {
    window_size: usize,
    window: VecDeque<WindowEntry>,
    stats: BTreeMap<String, StatVal>,
    /// Entropy estimate from the last accepted merged diff.
    e: f64,
    /// Observation count from the last accepted merged diff.
    n: f64,
    next_seq: u64,
    version: Version,
}

impl StatState {
    fn new(window_size: usize) -> Self {
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size.min(4096) + 1),
            stats: BTreeMap::new(),
            e: 0.0,
            n: 0.0,
            next_seq: 0,
            version: Version::default(),
        }
    }

    fn push(&mut self, key: &str, value: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.window.push_back(WindowEntry {
            seq,
            key: key.to_string(),
            value,
        });
        self.stats.entry(key.to_string()).or_default().add(value);

        while self.window.len() > self.window_size {
            let Some(oldest) = self.window.pop_front() else {
                break;
            };
            self.evict(oldest);
        }
    }

    fn evict(&mut self, entry: WindowEntry) {
        let StatState { window, stats, .. } = self;
        let Some(val) = stats.get_mut(&entry.key) else {
            return;
        };
        let surviving = window
            .iter()
            .filter(|e| e.key == entry.key)
            .map(|e| e.value);
        val.rem(entry.value, surviving);
        if val.n == 0 {
            stats.remove(&entry.key);
        }
    }

    fn entropy(&self) -> f64 {
        let total: f64 = self.stats.values().map(|v| v.sum).filter(|s| *s > 0.0).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let h: f64 = self
            .stats
            .values()
            .map(|v| v.sum)
            .filter(|s| *s > 0.0)
            .map(|s| {
                let p = s / total;
                p * p.ln()
            })
            .sum();
        (-h).max(0.0)
    }
}

/// Windowed statistics over string keys.
///
/// # Example
///
/// ```
/// use tessera_stat::Stat;
///
/// let stat = Stat::new(3);
/// stat.push("k", 1.0);
/// stat.push("k", 5.0);
/// stat.push("k", 3.0);
/// assert_eq!(stat.max("k"), 5.0);
/// assert_eq!(stat.min("k"), 1.0);
/// assert_eq!(stat.sum("k"), 9.0);
///
/// // The window holds three entries, so 1.0 is evicted.
/// stat.push("k", 2.0);
/// assert_eq!(stat.sum("k"), 10.0);
/// assert_eq!(stat.max("k"), 5.0);
/// assert_eq!(stat.min("k"), 2.0);
/// ```
#[derive(Debug)]
pub struct Stat {
    state: RwLock<StatState>,
}

impl Stat {
    /// Creates an engine keeping at most `window_size` observations.
    pub fn new(window_size: usize) -> Self {
        Self {
            state: RwLock::new(StatState::new(window_size)),
        }
    }

    /// Window capacity.
    pub fn window_size(&self) -> usize {
        sync::read(&self.state).window_size
    }

    /// Number of observations currently in the window.
    pub fn len(&self) -> usize {
        sync::read(&self.state).window.len()
    }

    /// Returns `true` if the window is empty.
    pub fn is_empty(&self) -> bool {
        sync::read(&self.state).window.is_empty()
    }

    /// Records an observation, evicting the oldest one if the window is full.
    ///
    /// NaN and infinite values are dropped with a warning: they would
    /// poison every aggregate of the key and cannot be packed.
    pub fn push(&self, key: &str, value: f64) {
        if !value.is_finite() {
            tracing::warn!(key, value, "dropping non-finite observation");
            return;
        }
        sync::write(&self.state).push(key, value);
    }

    /// Sum of the key's surviving values, `0.0` for unknown keys.
    pub fn sum(&self, key: &str) -> f64 {
        self.with_val(key, |v| v.sum)
    }

    /// Population standard deviation of the key's surviving values.
    pub fn stddev(&self, key: &str) -> f64 {
        self.with_val(key, StatVal::stddev)
    }

    /// Largest surviving value of the key.
    pub fn max(&self, key: &str) -> f64 {
        self.with_val(key, |v| v.max)
    }

    /// Smallest surviving value of the key.
    pub fn min(&self, key: &str) -> f64 {
        self.with_val(key, |v| v.min)
    }

    /// Number of surviving observations of the key.
    pub fn count(&self, key: &str) -> usize {
        self.with_val(key, |v| v.n)
    }

    /// The key's full aggregate, if it has surviving observations.
    pub fn stat_val(&self, key: &str) -> Option<StatVal> {
        sync::read(&self.state).stats.get(key).copied()
    }

    /// Keys with surviving observations, sorted.
    pub fn keys(&self) -> Vec<String> {
        sync::read(&self.state).stats.keys().cloned().collect()
    }

    /// Copy of the window, oldest first.
    pub fn window(&self) -> Vec<WindowEntry> {
        sync::read(&self.state).window.iter().cloned().collect()
    }

    /// `(1/n) Σ (value − center)^order` over the key's surviving values.
    ///
    /// Walks the raw window, so it costs O(window size). Returns `0.0`
    /// for unknown keys.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_stat::Stat;
    ///
    /// let stat = Stat::new(10);
    /// for v in [1.0, 2.0, 3.0] {
    ///     stat.push("k", v);
    /// }
    /// assert_eq!(stat.moment("k", 1, 0.0), 2.0);
    /// assert!((stat.moment("k", 2, 2.0) - 2.0 / 3.0).abs() < 1e-12);
    /// ```
    pub fn moment(&self, key: &str, order: i32, center: f64) -> f64 {
        let state = sync::read(&self.state);
        let (total, n) = state
            .window
            .iter()
            .filter(|e| e.key == key)
            .fold((0.0, 0usize), |(total, n), e| {
                (total + (e.value - center).powi(order), n + 1)
            });
        if n == 0 {
            0.0
        } else {
            total / n as f64
        }
    }

    /// Shannon entropy (nats) of the keys' share of the total sum.
    ///
    /// Only keys with a positive sum take part. Returns `0.0` when there is
    /// no positive mass.
    pub fn entropy(&self) -> f64 {
        sync::read(&self.state).entropy()
    }

    /// Cluster-wide entropy from the last accepted mix, or the local
    /// entropy if no mix has been applied yet.
    pub fn mixed_entropy(&self) -> f64 {
        let state = sync::read(&self.state);
        if state.n > 0.0 {
            state.e
        } else {
            state.entropy()
        }
    }

    /// Cluster-wide observation count from the last accepted mix.
    pub fn mixed_count(&self) -> f64 {
        sync::read(&self.state).n
    }

    /// Drops every observation, aggregate and mixed estimate.
    pub fn clear(&self) {
        let mut state = sync::write(&self.state);
        let window_size = state.window_size;
        let version = state.version;
        *state = StatState::new(window_size);
        state.version = version;
    }

    /// Short type tag.
    pub fn type_name(&self) -> &'static str {
        "stat"
    }

    fn with_val<T: Default>(&self, key: &str, f: impl FnOnce(&StatVal) -> T) -> T {
        sync::read(&self.state)
            .stats
            .get(key)
            .map(f)
            .unwrap_or_default()
    }
}

impl LinearMixable for Stat {
    type Diff = StatDiff;

    /// Local entropy weighted by the number of observations in the window.
    fn get_diff(&self) -> StatDiff {
        let state = sync::read(&self.state);
        StatDiff::new(state.entropy(), state.window.len() as u64)
    }

    fn put_diff(&self, diff: &StatDiff) -> bool {
        if !diff.is_consistent() {
            tracing::warn!(value = diff.value, count = diff.count, "rejecting inconsistent stat diff");
            return false;
        }
        let mut state = sync::write(&self.state);
        state.e = diff.value;
        state.n = diff.count as f64;
        state.version.increment();
        tracing::debug!(entropy = diff.value, count = diff.count, version = %state.version, "stat diff applied");
        true
    }

    fn mix(&self, lhs: &StatDiff, rhs: &StatDiff) -> StatDiff {
        StatDiff::merge(lhs, rhs)
    }

    fn version(&self) -> Version {
        sync::read(&self.state).version
    }

    fn pack(&self) -> Result<Vec<u8>, TesseraError> {
        Ok(serde_json::to_vec(&*sync::read(&self.state))?)
    }

    fn unpack(&self, bytes: &[u8]) -> Result<(), TesseraError> {
        let restored: StatState = serde_json::from_slice(bytes)?;
        if restored.window.len() > restored.window_size {
            return Err(TesseraError::SerializationError {
                message: format!(
                    "window holds {} entries but its capacity is {}",
                    restored.window.len(),
                    restored.window_size
                ),
            });
        }
        *sync::write(&self.state) = restored;
        Ok(())
    }
}
