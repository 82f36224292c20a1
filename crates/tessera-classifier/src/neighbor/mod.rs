//! Instance-based classifiers: `nearest_neighbor` and `recommender`.
//!
//! Every training example becomes a storage row keyed `<label>_<suffix>`.
//! Classification looks up the `k` nearest resident rows and scores each
//! label by `Σ exp(-local_sensitivity × distance)` over the rows carrying
//! it. Because rows live in the (possibly unlearning) storage, the set of
//! remembered examples is bounded by the same eviction policy as every
//! other classifier.

mod index;
mod inverted_index;
mod lsh;

pub use index::SimilarityIndex;
pub use inverted_index::InvertedIndex;
pub use lsh::LshIndex;

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::{Mutex, PoisonError, RwLock};

use tessera_core::{sync, SharedStorage, Storage, StorageDiff, TesseraError, Weight};
use tessera_unlearn::rng::SimpleRng;

use crate::classifier::{into_scored, Classifier, LabelSet, PackedClassifier, ScoredLabel};

/// Length of the random suffix of a row id.
pub const ROW_ID_SUFFIX_LEN: usize = 8;

/// The label a row id was generated for.
///
/// ```
/// use tessera_classifier::neighbor::label_of;
///
/// assert_eq!(label_of("spam_a8Fk2Lq0"), Some("spam"));
/// assert_eq!(label_of("two_words_a8Fk2Lq0"), Some("two_words"));
/// assert_eq!(label_of("nosuffix"), None);
/// ```
pub fn label_of(id: &str) -> Option<&str> {
    id.rsplit_once('_').map(|(label, _)| label)
}

/// Tuning of a neighbor classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborParams {
    /// Number of neighbors consulted per query.
    pub nearest_neighbor_num: usize,
    /// Decay of a neighbor's vote with its distance. Non-negative.
    pub local_sensitivity: f64,
}

/// A k-nearest-neighbor classifier backed by a [`SimilarityIndex`].
pub struct NeighborClassifier {
    kind: &'static str,
    params: NeighborParams,
    storage: SharedStorage,
    index: RwLock<Box<dyn SimilarityIndex>>,
    labels: LabelSet,
    rng: Mutex<SimpleRng>,
}

impl std::fmt::Debug for NeighborClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeighborClassifier")
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl NeighborClassifier {
    /// Creates a classifier registered as `kind` (`nearest_neighbor` or
    /// `recommender`).
    ///
    /// Rows already in `storage` are indexed immediately.
    pub fn new(
        kind: &'static str,
        params: NeighborParams,
        index: Box<dyn SimilarityIndex>,
        storage: SharedStorage,
    ) -> Self {
        let seed = RandomState::new().build_hasher().finish();
        let classifier = Self {
            kind,
            params,
            storage,
            index: RwLock::new(index),
            labels: LabelSet::default(),
            rng: Mutex::new(SimpleRng::new(seed)),
        };
        classifier.rebuild_index();
        classifier
    }

    /// The configured parameters.
    pub fn params(&self) -> NeighborParams {
        self.params
    }

    /// Number of rows currently indexed, including not yet pruned ones.
    pub fn indexed_rows(&self) -> usize {
        sync::read(&self.index).len()
    }

    fn next_row_id(&self, label: &str, storage: &dyn Storage) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let id = format!("{label}_{}", rng.next_alnum(ROW_ID_SUFFIX_LEN));
            if !storage.contains(&id) {
                return id;
            }
        }
    }

    fn rebuild_index(&self) {
        let rows: Vec<_> = {
            let storage = sync::read(&self.storage);
            storage
                .keys()
                .into_iter()
                .filter_map(|id| storage.get(&id).map(|row| (id, row)))
                .collect()
        };
        let mut index = sync::write(&self.index);
        index.clear();
        let mut labels = Vec::with_capacity(rows.len());
        for (id, row) in rows {
            if let Some(label) = label_of(&id) {
                labels.push(label.to_string());
            }
            index.insert(&id, &to_vector(&row));
        }
        self.labels.replace(labels);
    }

    /// Drops index entries for rows the storage has evicted.
    fn prune(&self) {
        let mut index = sync::write(&self.index);
        let storage = sync::read(&self.storage);
        if index.len() <= storage.len() {
            return;
        }
        let stale: Vec<String> = index
            .ids()
            .into_iter()
            .filter(|id| !storage.contains(id))
            .collect();
        for id in &stale {
            index.remove(id);
        }
        tracing::trace!(pruned = stale.len(), "pruned evicted rows from index");
    }
}

fn to_vector(row: &tessera_core::storage::Row) -> Vec<(String, f64)> {
    row.iter().map(|(f, w)| (f.clone(), w.value)).collect()
}

impl Classifier for NeighborClassifier {
    fn train(&self, fv: &[(String, f64)], label: &str) {
        self.labels.insert(label);
        if fv.is_empty() {
            return;
        }
        let id = {
            let mut storage = sync::write(&self.storage);
            let id = self.next_row_id(label, &*storage);
            for (feature, x) in fv {
                storage.set(&id, feature, Weight::new(*x));
            }
            id
        };
        sync::write(&self.index).insert(&id, fv);
        self.prune();
    }

    fn classify_with_scores(&self, fv: &[(String, f64)]) -> Vec<ScoredLabel> {
        let mut scores = self.labels.zero_scores();
        let neighbors = {
            let index = sync::read(&self.index);
            let storage = sync::read(&self.storage);
            index.neighbors(fv, self.params.nearest_neighbor_num, &|id| {
                storage.contains(id)
            })
        };
        for (id, distance) in neighbors {
            let Some(label) = label_of(&id) else { continue };
            *scores.entry(label.to_string()).or_default() +=
                (-self.params.local_sensitivity * distance).exp();
        }
        into_scored(scores)
    }

    fn get_labels(&self) -> Vec<String> {
        self.labels.to_vec()
    }

    fn set_label(&self, label: &str) -> bool {
        self.labels.insert(label)
    }

    fn delete_label(&self, label: &str) -> bool {
        if !self.labels.remove(label) {
            return false;
        }
        let removed: Vec<String> = {
            let mut storage = sync::write(&self.storage);
            let ids: Vec<String> = storage
                .keys()
                .into_iter()
                .filter(|id| label_of(id) == Some(label))
                .collect();
            for id in &ids {
                storage.remove(id);
            }
            ids
        };
        let mut index = sync::write(&self.index);
        for id in &removed {
            index.remove(id);
        }
        tracing::debug!(label, removed = removed.len(), "deleted label");
        true
    }

    fn clear(&self) {
        sync::write(&self.storage).clear();
        sync::write(&self.index).clear();
        self.labels.clear();
    }

    fn name(&self) -> String {
        format!("{}:{}", self.kind, sync::read(&self.index).name())
    }

    fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Applies the diff, then re-indexes every row it touched from the
    /// merged storage.
    fn put_diff(&self, diff: &StorageDiff) -> bool {
        let rows: Vec<_> = {
            let mut storage = sync::write(&self.storage);
            if !storage.put_diff(diff) {
                return false;
            }
            diff.keys()
                .filter_map(|id| storage.get(id).map(|row| (id.to_string(), row)))
                .collect()
        };
        let mut index = sync::write(&self.index);
        for (id, row) in &rows {
            if let Some(label) = label_of(id) {
                self.labels.insert(label);
            }
            index.insert(id, &to_vector(row));
        }
        drop(index);
        self.prune();
        true
    }

    fn pack(&self) -> Result<Vec<u8>, TesseraError> {
        let packed = PackedClassifier {
            labels: self.labels.to_vec(),
            storage: sync::read(&self.storage).pack()?,
        };
        Ok(serde_json::to_vec(&packed)?)
    }

    fn unpack(&self, bytes: &[u8]) -> Result<(), TesseraError> {
        let packed: PackedClassifier = serde_json::from_slice(bytes)?;
        sync::write(&self.storage).unpack(&packed.storage)?;
        self.rebuild_index();
        for label in &packed.labels {
            self.labels.insert(label);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use tessera_core::fv::from_pairs;
    use tessera_core::storage::{shared, LocalStorage};
    use tessera_unlearn::{LruUnlearner, UnlearningStorage};

    fn params() -> NeighborParams {
        NeighborParams {
            nearest_neighbor_num: 3,
            local_sensitivity: 1.0,
        }
    }

    fn classifier(index: Box<dyn SimilarityIndex>, storage: SharedStorage) -> NeighborClassifier {
        NeighborClassifier::new("recommender", params(), index, storage)
    }

    fn indexes() -> Vec<Box<dyn SimilarityIndex>> {
        vec![Box::new(InvertedIndex::new()), Box::new(LshIndex::new(64))]
    }

    #[test]
    fn votes_of_nearest_rows_win() {
        for index in indexes() {
            let c = classifier(index, shared(LocalStorage::new()));
            c.train(&from_pairs(&[("x", 1.0), ("y", 0.1)]), "left");
            c.train(&from_pairs(&[("x", 0.9), ("y", 0.2)]), "left");
            c.train(&from_pairs(&[("z", 1.0), ("w", 0.1)]), "right");
            let name = c.name();
            assert_eq!(
                c.classify(&from_pairs(&[("x", 1.0)])).as_deref(),
                Some("left"),
                "{name}"
            );
            assert_eq!(c.get_labels(), vec!["left", "right"]);
        }
    }

    #[test]
    fn rows_are_stored_under_label_prefixed_ids() {
        let storage = shared(LocalStorage::new());
        let c = classifier(Box::new(InvertedIndex::new()), storage.clone());
        c.train(&from_pairs(&[("x", 1.0)]), "spam");
        let keys = storage.read().unwrap().keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(label_of(&keys[0]), Some("spam"));
        assert_eq!(keys[0].len(), "spam_".len() + ROW_ID_SUFFIX_LEN);
    }

    #[test]
    fn evicted_rows_stop_voting() {
        let inner = shared(LocalStorage::new());
        let lru = LruUnlearner::new(NonZeroUsize::new(2).unwrap());
        let storage = shared(UnlearningStorage::new(inner.clone(), Box::new(lru)));
        let c = classifier(Box::new(InvertedIndex::new()), storage);

        c.train(&from_pairs(&[("x", 1.0)]), "old");
        c.train(&from_pairs(&[("y", 1.0)]), "new");
        c.train(&from_pairs(&[("y", 1.0)]), "new");

        assert_eq!(inner.read().unwrap().len(), 2);
        assert_eq!(c.indexed_rows(), 2);
        let scores = c.classify_with_scores(&from_pairs(&[("x", 1.0)]));
        let old = scores.iter().find(|s| s.label == "old").unwrap();
        assert_eq!(old.score, 0.0);
    }

    #[test]
    fn delete_label_removes_its_rows() {
        let storage = shared(LocalStorage::new());
        let c = classifier(Box::new(LshIndex::new(32)), storage.clone());
        c.train(&from_pairs(&[("x", 1.0)]), "a");
        c.train(&from_pairs(&[("x", 1.0)]), "b");
        assert!(c.delete_label("a"));
        assert_eq!(storage.read().unwrap().len(), 1);
        assert_eq!(c.indexed_rows(), 1);
        assert_eq!(c.classify(&from_pairs(&[("x", 1.0)])).as_deref(), Some("b"));
    }

    #[test]
    fn mixing_shares_examples_between_nodes() {
        let a = classifier(Box::new(InvertedIndex::new()), shared(LocalStorage::new()));
        let b = classifier(Box::new(InvertedIndex::new()), shared(LocalStorage::new()));
        a.train(&from_pairs(&[("x", 1.0)]), "from_a");
        b.train(&from_pairs(&[("y", 1.0)]), "from_b");

        let merged = Classifier::mix(&a, &a.get_diff(), &b.get_diff());
        assert!(a.put_diff(&merged));
        assert!(b.put_diff(&merged));

        for node in [&a, &b] {
            assert_eq!(node.get_labels(), vec!["from_a", "from_b"]);
            assert_eq!(node.classify(&from_pairs(&[("y", 1.0)])).as_deref(), Some("from_b"));
        }
    }

    #[test]
    fn pack_round_trip_rebuilds_index() {
        let a = classifier(Box::new(LshIndex::new(64)), shared(LocalStorage::new()));
        a.train(&from_pairs(&[("x", 1.0)]), "a");
        a.train(&from_pairs(&[("y", 1.0)]), "b");
        a.set_label("untrained");

        let restored = classifier(Box::new(LshIndex::new(64)), shared(LocalStorage::new()));
        restored.unpack(&a.pack().unwrap()).unwrap();
        assert_eq!(restored.indexed_rows(), 2);
        assert_eq!(restored.get_labels(), vec!["a", "b", "untrained"]);
        let fv = from_pairs(&[("x", 1.0)]);
        assert_eq!(restored.classify_with_scores(&fv), a.classify_with_scores(&fv));
    }

    #[test]
    fn name_includes_method() {
        let c = classifier(Box::new(LshIndex::new(8)), shared(LocalStorage::new()));
        assert_eq!(c.name(), "recommender:lsh");
    }
}
