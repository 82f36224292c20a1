//! # tessera-classifier
//!
//! Online classifiers for the Tessera runtime and the factory that builds
//! them from configuration.
//!
//! ## Key Components
//!
//! - [`Classifier`]: train / classify / label management plus the
//!   get_diff / mix / put_diff mixing contract over the classifier's storage
//! - [`linear::LinearClassifier`]: `perceptron`, `PA`, `PA1`, `PA2`, `CW`,
//!   `AROW`, `NHERD`
//! - [`neighbor::NeighborClassifier`]: `nearest_neighbor` and
//!   `recommender` over an inverted index or LSH
//! - [`create_classifier`]: validates a config and assembles a classifier,
//!   wrapping its storage in an unlearner when one is configured
//!
//! ## Architecture Rules
//!
//! - Learned state lives in the [`tessera_core::Storage`]; classifiers keep
//!   only labels and derived indexes beside it.
//! - Construction validates everything before touching the storage.
//! - When an index lock and the storage lock are both held, the index lock
//!   is taken first.

mod classifier;
mod factory;
pub mod linear;
pub mod neighbor;

pub use classifier::{Classifier, ClassifierHandle, ScoredLabel};
pub use factory::{
    create_classifier, CLASSIFIER_NAMES, DEFAULT_REGULARIZATION_WEIGHT, MAX_HASH_NUM,
    NEIGHBOR_METHODS,
};

pub use tessera_core;
