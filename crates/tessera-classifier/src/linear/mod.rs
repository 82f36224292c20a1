//! Linear classifiers: one weight per (feature, label) pair.
//!
//! Weights live in the classifier's storage with the feature as row key and
//! the label as column, so mixing a linear classifier is mixing its storage.

mod algorithm;

pub use algorithm::{Algorithm, Margin, Update};

use std::collections::BTreeMap;

use tessera_core::storage::Row;
use tessera_core::{sync, SharedStorage, Storage, StorageDiff, TesseraError, Weight};

use crate::classifier::{into_scored, Classifier, LabelSet, PackedClassifier, ScoredLabel};

/// A linear classifier over a shared storage.
///
/// # Example
///
/// ```
/// use tessera_classifier::linear::{Algorithm, LinearClassifier};
/// use tessera_classifier::Classifier;
/// use tessera_core::fv::from_pairs;
/// use tessera_core::storage::{shared, LocalStorage};
///
/// let classifier = LinearClassifier::new(
///     Algorithm::PassiveAggressive1 { c: 1.0 },
///     shared(LocalStorage::new()),
/// );
/// classifier.train(&from_pairs(&[("viagra", 1.0)]), "spam");
/// classifier.train(&from_pairs(&[("meeting", 1.0)]), "ham");
///
/// let label = classifier.classify(&from_pairs(&[("viagra", 1.0)]));
/// assert_eq!(label.as_deref(), Some("spam"));
/// ```
pub struct LinearClassifier {
    algorithm: Algorithm,
    storage: SharedStorage,
    labels: LabelSet,
}

impl std::fmt::Debug for LinearClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearClassifier")
            .field("algorithm", &self.algorithm)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl LinearClassifier {
    /// Creates a classifier that learns into `storage`.
    ///
    /// Labels already present as columns in `storage` are adopted.
    pub fn new(algorithm: Algorithm, storage: SharedStorage) -> Self {
        let classifier = Self {
            algorithm,
            storage,
            labels: LabelSet::default(),
        };
        classifier.adopt_labels();
        classifier
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn adopt_labels(&self) {
        let storage = sync::read(&self.storage);
        for key in storage.keys() {
            if let Some(row) = storage.get(&key) {
                for label in row.keys() {
                    self.labels.insert(label);
                }
            }
        }
    }

    fn scores(&self, fv: &[(String, f64)], rows: &[Option<Row>]) -> BTreeMap<String, f64> {
        let mut scores = self.labels.zero_scores();
        for ((_, x), row) in fv.iter().zip(rows) {
            let Some(row) = row else { continue };
            for (label, w) in row {
                if let Some(score) = scores.get_mut(label) {
                    *score += x * w.value;
                }
            }
        }
        scores
    }

    fn margin(
        fv: &[(String, f64)],
        rows: &[Option<Row>],
        scores: &BTreeMap<String, f64>,
        label: &str,
    ) -> Margin {
        let correct = scores.get(label).copied().unwrap_or(0.0);
        let incorrect = best(scores.iter().filter(|(l, _)| l.as_str() != label));
        let predicted = best(scores.iter());

        let sigma = |row: &Option<Row>, l: &str| {
            row.as_ref()
                .and_then(|r| r.get(l))
                .map_or(Weight::default().covariance, |w| w.covariance)
        };
        let variance = fv
            .iter()
            .zip(rows)
            .map(|((_, x), row)| {
                let wrong = incorrect.as_ref().map_or(0.0, |(l, _)| sigma(row, l));
                x * x * (sigma(row, label) + wrong)
            })
            .sum();

        Margin {
            margin: correct - incorrect.as_ref().map_or(0.0, |(_, s)| *s),
            incorrect: incorrect.map(|(l, _)| l),
            predicted: predicted.map(|(l, _)| l),
            variance,
        }
    }
}

/// Highest score, ties to the label that sorts first.
fn best<'a>(scores: impl Iterator<Item = (&'a String, &'a f64)>) -> Option<(String, f64)> {
    scores
        .fold(None::<(&String, f64)>, |best, (l, s)| match best {
            Some((_, b)) if b >= *s => best,
            _ => Some((l, *s)),
        })
        .map(|(l, s)| (l.clone(), s))
}

impl Classifier for LinearClassifier {
    fn train(&self, fv: &[(String, f64)], label: &str) {
        self.labels.insert(label);

        let mut storage = sync::write(&self.storage);
        let rows: Vec<Option<Row>> = fv.iter().map(|(f, _)| storage.get(f)).collect();
        let scores = self.scores(fv, &rows);
        let margin = Self::margin(fv, &rows, &scores, label);
        let Some(update) = self.algorithm.plan(fv, &margin, label) else {
            return;
        };

        tracing::trace!(
            algorithm = self.algorithm.name(),
            label,
            margin = margin.margin,
            "updating weights"
        );
        for ((feature, x), row) in fv.iter().zip(&rows) {
            let current = |l: &str| {
                row.as_ref()
                    .and_then(|r| r.get(l).copied())
                    .unwrap_or_default()
            };
            storage.set(feature, label, update.apply(current(label), *x, 1.0));
            if let Some(wrong) = margin.incorrect.as_deref() {
                storage.set(feature, wrong, update.apply(current(wrong), *x, -1.0));
            }
        }
    }

    fn classify_with_scores(&self, fv: &[(String, f64)]) -> Vec<ScoredLabel> {
        let storage = sync::read(&self.storage);
        let rows: Vec<Option<Row>> = fv.iter().map(|(f, _)| storage.get(f)).collect();
        into_scored(self.scores(fv, &rows))
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
        let removed = sync::write(&self.storage).remove_column(label);
        tracing::debug!(label, removed, "deleted label");
        true
    }

    fn clear(&self) {
        sync::write(&self.storage).clear();
        self.labels.clear();
    }

    fn name(&self) -> String {
        self.algorithm.name().to_string()
    }

    fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    fn put_diff(&self, diff: &StorageDiff) -> bool {
        if !sync::write(&self.storage).put_diff(diff) {
            return false;
        }
        for label in diff.entries.values().flat_map(|row| row.keys()) {
            self.labels.insert(label);
        }
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
        self.labels.replace(packed.labels);
        Ok(())
    }
}
