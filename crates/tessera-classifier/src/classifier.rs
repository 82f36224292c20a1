//! The capability set shared by every classifier family.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tessera_core::{sync, LinearMixable, SharedStorage, Storage, StorageDiff, TesseraError, Version};

/// Thread-safe handle returned by the factory.
pub type ClassifierHandle = Arc<dyn Classifier>;

/// A label and its score for one classified vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLabel {
    /// Class label.
    pub label: String,
    /// Higher is more likely.
    pub score: f64,
}

/// An online classifier.
///
/// Implementations use interior locking so a handle can be shared between
/// a learning thread and the mixing thread. Learned state lives in the
/// [`SharedStorage`] the classifier was built with, which is also what it
/// mixes with its peers.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Learns from one labelled example.
    fn train(&self, fv: &[(String, f64)], label: &str);

    /// Scores every known label, sorted by label name.
    fn classify_with_scores(&self, fv: &[(String, f64)]) -> Vec<ScoredLabel>;

    /// The best-scoring label, or `None` if no label is known yet.
    /// Ties go to the label that sorts first.
    fn classify(&self, fv: &[(String, f64)]) -> Option<String> {
        self.classify_with_scores(fv)
            .into_iter()
            .fold(None::<ScoredLabel>, |best, s| match best {
                Some(b) if b.score >= s.score => Some(b),
                _ => Some(s),
            })
            .map(|s| s.label)
    }

    /// Known labels, sorted.
    fn get_labels(&self) -> Vec<String>;

    /// Registers a label without training. Returns `true` if it was new.
    fn set_label(&self, label: &str) -> bool;

    /// Forgets a label and everything learned for it. Returns `true` if
    /// the label existed.
    fn delete_label(&self, label: &str) -> bool;

    /// Forgets everything.
    fn clear(&self);

    /// Algorithm name, e.g. `PA1` or `recommender:lsh`.
    fn name(&self) -> String;

    /// The storage the classifier learns into (possibly a decorator).
    fn storage(&self) -> &SharedStorage;

    /// Local changes since the last accepted merged diff.
    fn get_diff(&self) -> StorageDiff {
        sync::read(self.storage()).get_diff()
    }

    /// Applies a merged diff.
    fn put_diff(&self, diff: &StorageDiff) -> bool;

    /// Combines two diffs (count-weighted, commutative, associative).
    fn mix(&self, lhs: &StorageDiff, rhs: &StorageDiff) -> StorageDiff {
        StorageDiff::merge(lhs, rhs)
    }

    /// Version of the learned state.
    fn version(&self) -> Version {
        sync::read(self.storage()).version()
    }

    /// Serializes labels and learned state.
    fn pack(&self) -> Result<Vec<u8>, TesseraError>;

    /// Restores a packed snapshot.
    fn unpack(&self, bytes: &[u8]) -> Result<(), TesseraError>;
}

impl LinearMixable for dyn Classifier {
    type Diff = StorageDiff;

    fn get_diff(&self) -> StorageDiff {
        Classifier::get_diff(self)
    }

    fn put_diff(&self, diff: &StorageDiff) -> bool {
        Classifier::put_diff(self, diff)
    }

    fn mix(&self, lhs: &StorageDiff, rhs: &StorageDiff) -> StorageDiff {
        Classifier::mix(self, lhs, rhs)
    }

    fn version(&self) -> Version {
        Classifier::version(self)
    }

    fn pack(&self) -> Result<Vec<u8>, TesseraError> {
        Classifier::pack(self)
    }

    fn unpack(&self, bytes: &[u8]) -> Result<(), TesseraError> {
        Classifier::unpack(self, bytes)
    }
}

/// Snapshot layout shared by the classifier families.
#[derive(Serialize, Deserialize)]
pub(crate) struct PackedClassifier {
    pub labels: Vec<String>,
    pub storage: Vec<u8>,
}

/// The set of labels a classifier knows about.
#[derive(Debug, Default)]
pub(crate) struct LabelSet {
    labels: RwLock<BTreeSet<String>>,
}

impl LabelSet {
    pub fn insert(&self, label: &str) -> bool {
        if sync::read(&self.labels).contains(label) {
            return false;
        }
        sync::write(&self.labels).insert(label.to_string())
    }

    pub fn remove(&self, label: &str) -> bool {
        sync::write(&self.labels).remove(label)
    }

    pub fn to_vec(&self) -> Vec<String> {
        sync::read(&self.labels).iter().cloned().collect()
    }

    pub fn zero_scores(&self) -> BTreeMap<String, f64> {
        sync::read(&self.labels)
            .iter()
            .map(|l| (l.clone(), 0.0))
            .collect()
    }

    pub fn replace(&self, labels: impl IntoIterator<Item = String>) {
        *sync::write(&self.labels) = labels.into_iter().collect();
    }

    pub fn clear(&self) {
        sync::write(&self.labels).clear();
    }
}

pub(crate) fn into_scored(scores: BTreeMap<String, f64>) -> Vec<ScoredLabel> {
    scores
        .into_iter()
        .map(|(label, score)| ScoredLabel { label, score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_set_basics() {
        let labels = LabelSet::default();
        assert!(labels.insert("b"));
        assert!(labels.insert("a"));
        assert!(!labels.insert("a"));
        assert_eq!(labels.to_vec(), vec!["a", "b"]);
        assert_eq!(labels.zero_scores().len(), 2);
        assert!(labels.remove("a"));
        assert!(!labels.remove("a"));
        labels.replace(vec!["z".to_string()]);
        assert_eq!(labels.to_vec(), vec!["z"]);
        labels.clear();
        assert!(labels.to_vec().is_empty());
    }

    #[test]
    fn into_scored_keeps_label_order() {
        let scores = BTreeMap::from([("b".to_string(), 1.0), ("a".to_string(), 2.0)]);
        let scored = into_scored(scores);
        assert_eq!(scored[0].label, "a");
        assert_eq!(scored[1].score, 1.0);
    }
}
