//! Key→weight storage used by learning algorithms.
//!
//! A storage holds *rows* keyed by string. Each row maps a column name to a
//! [`Weight`]. Linear classifiers key rows by feature and use labels as
//! columns; neighbor-based classifiers key rows by training-row id and use
//! feature names as columns.
//!
//! Storages are shared through [`SharedStorage`] (`Arc<RwLock<dyn Storage>>`)
//! so a classifier and its eviction decorator can point at the same
//! underlying table.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::TesseraError;
use crate::version::Version;

/// A single learned parameter: a weight and its (diagonal) covariance.
///
/// Algorithms that do not track confidence simply ignore `covariance`,
/// which starts at `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    /// Weight value.
    pub value: f64,
    /// Diagonal covariance (confidence) for CW, AROW and NHERD.
    pub covariance: f64,
}

impl Default for Weight {
    fn default() -> Self {
        Self {
            value: 0.0,
            covariance: 1.0,
        }
    }
}

impl Weight {
    /// A weight with the given value and the default covariance.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

/// One storage row: column name → weight.
pub type Row = BTreeMap<String, Weight>;

/// Thread-safe handle to a storage shared between components.
pub type SharedStorage = Arc<RwLock<dyn Storage>>;

/// Wraps a storage into a [`SharedStorage`] handle.
///
/// # Example
///
/// ```
/// use tessera_core::storage::{shared, LocalStorage, Weight};
///
/// let storage = shared(LocalStorage::new());
/// storage.write().unwrap().set("f1", "spam", Weight::new(0.5));
/// assert_eq!(storage.read().unwrap().len(), 1);
/// ```
pub fn shared<S: Storage + 'static>(storage: S) -> SharedStorage {
    Arc::new(RwLock::new(storage))
}

/// The access contract every weight store implements.
///
/// Reads take `&self`, writes take `&mut self`; callers serialize access
/// through the [`SharedStorage`] lock. Implementations may still keep
/// interior bookkeeping on reads (an LRU decorator records touches).
pub trait Storage: Send + Sync {
    /// Returns a copy of the row stored under `key`.
    fn get(&self, key: &str) -> Option<Row>;

    /// Writes one column of a row, creating the row if needed.
    fn set(&mut self, key: &str, column: &str, weight: Weight);

    /// Removes a whole row. Returns `true` if it existed.
    fn remove(&mut self, key: &str) -> bool;

    /// Removes `column` from every row, dropping rows left empty.
    /// Returns the number of rows that contained it.
    fn remove_column(&mut self, column: &str) -> usize;

    /// Returns `true` if a row is stored under `key`.
    fn contains(&self, key: &str) -> bool;

    /// All resident row keys, in unspecified order.
    fn keys(&self) -> Vec<String>;

    /// Number of resident rows.
    fn len(&self) -> usize;

    /// Returns `true` if no rows are resident.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every row and all mixing bookkeeping.
    fn clear(&mut self);

    /// Current state version.
    fn version(&self) -> Version;

    /// Local changes since the last accepted merged diff.
    fn get_diff(&self) -> StorageDiff;

    /// Applies a merged diff. Returns `false`, leaving state unchanged,
    /// if the diff is inconsistent.
    fn put_diff(&mut self, diff: &StorageDiff) -> bool;

    /// Serializes all rows and the version.
    fn pack(&self) -> Result<Vec<u8>, TesseraError>;

    /// Replaces the state with a packed snapshot.
    fn unpack(&mut self, bytes: &[u8]) -> Result<(), TesseraError>;

    /// Short type tag for logs and classifier names.
    fn type_name(&self) -> &'static str;
}

/// Change of one row column since the last mix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Change of [`Weight::value`].
    pub value: f64,
    /// Change of [`Weight::covariance`].
    pub covariance: f64,
    /// Number of local writes folded into this entry.
    pub count: u64,
}

impl DiffEntry {
    fn is_finite(&self) -> bool {
        self.value.is_finite() && self.covariance.is_finite()
    }

    fn merge(lhs: &DiffEntry, rhs: &DiffEntry) -> DiffEntry {
        let count = lhs.count.saturating_add(rhs.count);
        if count == 0 {
            return DiffEntry::default();
        }
        let (lc, rc, n) = (lhs.count as f64, rhs.count as f64, count as f64);
        DiffEntry {
            value: (lhs.value * lc + rhs.value * rc) / n,
            covariance: (lhs.covariance * lc + rhs.covariance * rc) / n,
            count,
        }
    }
}

/// A node's not-yet-merged storage contribution.
///
/// Merging is a per-entry count-weighted average with summed counts, which
/// makes [`StorageDiff::merge`] commutative and associative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageDiff {
    /// row key → column → change.
    pub entries: BTreeMap<String, BTreeMap<String, DiffEntry>>,
    /// Total number of local writes behind this diff.
    pub count: u64,
}

impl StorageDiff {
    /// Combines two diffs from different nodes.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use tessera_core::storage::{DiffEntry, StorageDiff};
    ///
    /// let entry = |value, count| StorageDiff {
    ///     entries: BTreeMap::from([(
    ///         "f".to_string(),
    ///         BTreeMap::from([("a".to_string(), DiffEntry { value, covariance: 0.0, count })]),
    ///     )]),
    ///     count,
    /// };
    ///
    /// let merged = StorageDiff::merge(&entry(1.0, 1), &entry(4.0, 3));
    /// assert_eq!(merged.count, 4);
    /// assert_eq!(merged.entries["f"]["a"].value, 3.25);
    /// ```
    pub fn merge(lhs: &StorageDiff, rhs: &StorageDiff) -> StorageDiff {
        let mut entries = lhs.entries.clone();
        for (key, columns) in &rhs.entries {
            let row = entries.entry(key.clone()).or_default();
            for (column, entry) in columns {
                let merged = match row.get(column) {
                    Some(existing) => DiffEntry::merge(existing, entry),
                    None => *entry,
                };
                row.insert(column.clone(), merged);
            }
        }
        StorageDiff {
            entries,
            count: lhs.count.saturating_add(rhs.count),
        }
    }

    /// Returns `true` if the diff carries no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row keys touched by this diff.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns `false` if any entry holds a NaN or infinite change.
    pub fn is_consistent(&self) -> bool {
        self.entries
            .values()
            .flat_map(|row| row.values())
            .all(DiffEntry::is_finite)
    }
}

#[derive(Serialize, Deserialize)]
struct PackedStorage {
    rows: BTreeMap<String, Row>,
    version: Version,
}

/// In-process storage backed by hash maps.
///
/// Besides the current rows it remembers each row as of the last accepted
/// merged diff and how many local writes every column received since, which
/// is what [`Storage::get_diff`] reports.
///
/// # Example
///
/// ```
/// use tessera_core::storage::{LocalStorage, Storage, Weight};
///
/// let mut storage = LocalStorage::new();
/// storage.set("f1", "spam", Weight::new(1.5));
///
/// let diff = storage.get_diff();
/// assert_eq!(diff.count, 1);
/// assert_eq!(diff.entries["f1"]["spam"].value, 1.5);
///
/// assert!(storage.put_diff(&diff));
/// assert!(storage.get_diff().is_empty());
/// assert_eq!(storage.version().get(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    rows: HashMap<String, Row>,
    mixed: HashMap<String, Row>,
    pending: HashMap<String, BTreeMap<String, u64>>,
    version: Version,
}

impl LocalStorage {
    /// Creates an empty storage at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    fn base(&self, key: &str, column: &str) -> Weight {
        self.mixed
            .get(key)
            .and_then(|row| row.get(column))
            .copied()
            .unwrap_or_default()
    }
}

impl Storage for LocalStorage {
    fn get(&self, key: &str) -> Option<Row> {
        self.rows.get(key).cloned()
    }

    fn set(&mut self, key: &str, column: &str, weight: Weight) {
        self.rows
            .entry(key.to_string())
            .or_default()
            .insert(column.to_string(), weight);
        let writes = self
            .pending
            .entry(key.to_string())
            .or_default()
            .entry(column.to_string())
            .or_insert(0);
        *writes = writes.saturating_add(1);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.mixed.remove(key);
        self.pending.remove(key);
        self.rows.remove(key).is_some()
    }

    fn remove_column(&mut self, column: &str) -> usize {
        let mut hits = 0;
        for row in self.rows.values_mut() {
            if row.remove(column).is_some() {
                hits += 1;
            }
        }
        for row in self.mixed.values_mut() {
            row.remove(column);
        }
        for counts in self.pending.values_mut() {
            counts.remove(column);
        }
        self.rows.retain(|_, row| !row.is_empty());
        self.mixed.retain(|_, row| !row.is_empty());
        self.pending.retain(|_, counts| !counts.is_empty());
        hits
    }

    fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.rows.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.mixed.clear();
        self.pending.clear();
    }

    fn version(&self) -> Version {
        self.version
    }

    fn get_diff(&self) -> StorageDiff {
        let mut diff = StorageDiff::default();
        for (key, counts) in &self.pending {
            let Some(row) = self.rows.get(key) else {
                continue;
            };
            for (column, &count) in counts {
                let Some(current) = row.get(column) else {
                    continue;
                };
                let base = self.base(key, column);
                diff.entries.entry(key.clone()).or_default().insert(
                    column.clone(),
                    DiffEntry {
                        value: current.value - base.value,
                        covariance: current.covariance - base.covariance,
                        count,
                    },
                );
                diff.count = diff.count.saturating_add(count);
            }
        }
        diff
    }

    fn put_diff(&mut self, diff: &StorageDiff) -> bool {
        if !diff.is_consistent() {
            return false;
        }
        for (key, columns) in &diff.entries {
            for (column, entry) in columns {
                let base = self.base(key, column);
                let merged = Weight {
                    value: base.value + entry.value,
                    covariance: base.covariance + entry.covariance,
                };
                self.rows
                    .entry(key.clone())
                    .or_default()
                    .insert(column.clone(), merged);
                self.mixed
                    .entry(key.clone())
                    .or_default()
                    .insert(column.clone(), merged);
                if let Some(counts) = self.pending.get_mut(key) {
                    counts.remove(column);
                }
            }
        }
        self.pending.retain(|_, counts| !counts.is_empty());
        self.version.increment();
        true
    }

    fn pack(&self) -> Result<Vec<u8>, TesseraError> {
        let packed = PackedStorage {
            rows: self.rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            version: self.version,
        };
        Ok(serde_json::to_vec(&packed)?)
    }

    fn unpack(&mut self, bytes: &[u8]) -> Result<(), TesseraError> {
        let packed: PackedStorage = serde_json::from_slice(bytes)?;
        self.rows = packed.rows.into_iter().collect();
        self.mixed = self.rows.clone();
        self.pending.clear();
        self.version = packed.version;
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "local"
    }
}
