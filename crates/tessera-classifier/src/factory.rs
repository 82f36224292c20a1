//! Builds classifiers from a name, a JSON config, and a storage.

use std::sync::Arc;

use tessera_core::storage::shared;
use tessera_core::{Config, SharedStorage, TesseraError};
use tessera_unlearn::{create_unlearner, UnlearningStorage};

use crate::classifier::ClassifierHandle;
use crate::linear::{Algorithm, LinearClassifier};
use crate::neighbor::{
    InvertedIndex, LshIndex, NeighborClassifier, NeighborParams, SimilarityIndex,
};

/// Every algorithm name [`create_classifier`] accepts. Names are
/// case-sensitive.
pub const CLASSIFIER_NAMES: &[&str] = &[
    "perceptron",
    "PA",
    "PA1",
    "PA2",
    "CW",
    "AROW",
    "NHERD",
    "nearest_neighbor",
    "recommender",
];

/// Similarity methods of the neighbor classifiers.
pub const NEIGHBOR_METHODS: &[&str] = &["inverted_index", "lsh"];

/// Largest LSH signature the factory accepts, in bits.
pub const MAX_HASH_NUM: usize = 4096;

/// Default regularization weight when none is configured and no unlearner
/// is in use.
pub const DEFAULT_REGULARIZATION_WEIGHT: f64 = 1.0;

enum Plan {
    Linear(Algorithm),
    Neighbor {
        kind: &'static str,
        params: NeighborParams,
        method: Method,
    },
}

enum Method {
    InvertedIndex,
    Lsh { hash_num: usize },
}

/// Creates a classifier.
///
/// Validation runs in a fixed order and finishes before anything is built
/// or the storage is touched:
///
/// 1. `name` must be one of [`CLASSIFIER_NAMES`].
/// 2. `unlearner` / `unlearner_parameter`, if present (see
///    [`create_unlearner`]).
/// 3. The algorithm's own parameters:
///    - `PA1`, `PA2`, `CW`, `AROW`, `NHERD`: `regularization_weight`, a
///      positive number. Optional (defaults to
///      [`DEFAULT_REGULARIZATION_WEIGHT`]) unless an unlearner is
///      configured, in which case it is required.
///    - `nearest_neighbor`, `recommender`: `method` (one of
///      [`NEIGHBOR_METHODS`]), `parameter.hash_num` for `lsh` (at most
///      [`MAX_HASH_NUM`]),
///      `nearest_neighbor_num` (positive integer) and `local_sensitivity`
///      (non-negative number).
///
/// When an unlearner is configured, `storage` is wrapped in an
/// [`UnlearningStorage`] and the classifier learns through it.
///
/// # Errors
///
/// - [`TesseraError::UnsupportedMethod`] for an unknown algorithm,
///   unlearner, or neighbor method name.
/// - [`TesseraError::ConfigError`] for any missing, mistyped, or
///   out-of-range parameter.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tessera_classifier::create_classifier;
/// use tessera_core::storage::{shared, LocalStorage};
/// use tessera_core::Config;
///
/// let config = Config::new(json!({
///     "regularization_weight": 0.5,
///     "unlearner": "lru",
///     "unlearner_parameter": { "max_size": 1000 }
/// }));
/// let classifier = create_classifier("AROW", &config, shared(LocalStorage::new())).unwrap();
/// assert_eq!(classifier.name(), "AROW");
///
/// let err = create_classifier("ARoW", &config, shared(LocalStorage::new())).unwrap_err();
/// assert!(err.is_unsupported_method());
/// ```
pub fn create_classifier(
    name: &str,
    config: &Config,
    storage: SharedStorage,
) -> Result<ClassifierHandle, TesseraError> {
    match build(name, config, storage) {
        Ok(classifier) => {
            tracing::debug!(classifier = %classifier.name(), "created classifier");
            Ok(classifier)
        }
        Err(err) => {
            tracing::warn!(classifier = name, error = %err, "rejected classifier config");
            Err(err)
        }
    }
}

fn build(
    name: &str,
    config: &Config,
    storage: SharedStorage,
) -> Result<ClassifierHandle, TesseraError> {
    if !CLASSIFIER_NAMES.contains(&name) {
        return Err(TesseraError::unsupported(name));
    }
    let unlearner = create_unlearner(config)?;
    let plan = plan(name, config, unlearner.is_some())?;

    let storage = match unlearner {
        Some(unlearner) => {
            tracing::debug!(
                classifier = name,
                unlearner = unlearner.name(),
                max_size = unlearner.max_size(),
                "wrapping storage with unlearner"
            );
            shared(UnlearningStorage::new(storage, unlearner))
        }
        None => storage,
    };

    let classifier: ClassifierHandle = match plan {
        Plan::Linear(algorithm) => Arc::new(LinearClassifier::new(algorithm, storage)),
        Plan::Neighbor {
            kind,
            params,
            method,
        } => {
            let index: Box<dyn SimilarityIndex> = match method {
                Method::InvertedIndex => Box::new(InvertedIndex::new()),
                Method::Lsh { hash_num } => Box::new(LshIndex::new(hash_num)),
            };
            Arc::new(NeighborClassifier::new(kind, params, index, storage))
        }
    };
    Ok(classifier)
}

fn plan(name: &str, config: &Config, has_unlearner: bool) -> Result<Plan, TesseraError> {
    let regularization = || regularization_weight(config, has_unlearner);
    let algorithm = match name {
        "perceptron" => Algorithm::Perceptron,
        "PA" => Algorithm::PassiveAggressive,
        "PA1" => Algorithm::PassiveAggressive1 { c: regularization()? },
        "PA2" => Algorithm::PassiveAggressive2 { c: regularization()? },
        "CW" => Algorithm::ConfidenceWeighted { c: regularization()? },
        "AROW" => Algorithm::Arow { c: regularization()? },
        "NHERD" => Algorithm::Nherd { c: regularization()? },
        "nearest_neighbor" => return neighbor_plan("nearest_neighbor", config),
        "recommender" => return neighbor_plan("recommender", config),
        other => return Err(TesseraError::unsupported(other)),
    };
    Ok(Plan::Linear(algorithm))
}

fn regularization_weight(config: &Config, has_unlearner: bool) -> Result<f64, TesseraError> {
    let weight = match config.get("regularization_weight") {
        Some(weight) => weight,
        None if has_unlearner => {
            return Err(TesseraError::config(
                format!("{}.regularization_weight", config.path()),
                "is required when an unlearner is configured",
            ));
        }
        None => return Ok(DEFAULT_REGULARIZATION_WEIGHT),
    };
    let value = weight.as_f64()?;
    if !(value.is_finite() && value > 0.0) {
        return Err(TesseraError::config(weight.path(), "must be a positive number"));
    }
    Ok(value)
}

fn neighbor_plan(kind: &'static str, config: &Config) -> Result<Plan, TesseraError> {
    let method_config = config.require("method")?;
    let method = match method_config.as_str()? {
        "inverted_index" => Method::InvertedIndex,
        "lsh" => {
            let hash_num_config = config.require("parameter")?.require("hash_num")?;
            let hash_num = hash_num_config.as_positive_usize()?;
            if hash_num > MAX_HASH_NUM {
                return Err(TesseraError::config(
                    hash_num_config.path(),
                    format!("must be at most {MAX_HASH_NUM}"),
                ));
            }
            Method::Lsh { hash_num }
        }
        other => return Err(TesseraError::unsupported(other)),
    };

    let nearest_neighbor_num = config.require("nearest_neighbor_num")?.as_positive_usize()?;
    let sensitivity = config.require("local_sensitivity")?;
    let local_sensitivity = sensitivity.as_f64()?;
    if !(local_sensitivity.is_finite() && local_sensitivity >= 0.0) {
        return Err(TesseraError::config(
            sensitivity.path(),
            "must be a non-negative number",
        ));
    }

    Ok(Plan::Neighbor {
        kind,
        params: NeighborParams {
            nearest_neighbor_num,
            local_sensitivity,
        },
        method,
    })
}
