//! Factory acceptance and rejection cases.

use serde_json::{json, Value};
use tessera_classifier::{create_classifier, ClassifierHandle, CLASSIFIER_NAMES};
use tessera_core::storage::{shared, LocalStorage};
use tessera_core::{Config, SharedStorage, Storage, TesseraError, Weight};

fn create(
    name: &str,
    config: &Value,
    storage: &SharedStorage,
) -> Result<ClassifierHandle, TesseraError> {
    create_classifier(name, &Config::new(config.clone()), storage.clone())
}

const REGULARIZED: &[&str] = &["PA1", "PA2", "CW", "AROW", "NHERD"];

#[test]
fn create_without_unlearner() {
    let s = shared(LocalStorage::new());

    for config in [json!({}), Value::Null] {
        for name in ["perceptron", "PA"] {
            create(name, &config, &s).unwrap();
        }
        // Regularization weight falls back to its default.
        for name in REGULARIZED {
            create(name, &config, &s).unwrap();
        }
    }

    let config = json!({ "regularization_weight": 1.0 });
    for name in REGULARIZED {
        let classifier = create(name, &config, &s).unwrap();
        assert_eq!(classifier.name(), *name);
    }
}

#[test]
fn create_with_unlearner() {
    let s = shared(LocalStorage::new());
    let lru = json!({ "max_size": 1 });

    let config = json!({ "unlearner": "lru", "unlearner_parameter": lru });
    for name in ["perceptron", "PA"] {
        create(name, &config, &s).unwrap();
    }

    let config = json!({
        "regularization_weight": 1.0,
        "unlearner": "lru",
        "unlearner_parameter": lru
    });
    for name in REGULARIZED {
        create(name, &config, &s).unwrap();
    }

    let config = json!({
        "method": "inverted_index",
        "nearest_neighbor_num": 10,
        "local_sensitivity": 1.0,
        "unlearner": "lru",
        "unlearner_parameter": lru
    });
    let recommender = create("recommender", &config, &s).unwrap();
    assert_eq!(recommender.name(), "recommender:inverted_index");

    let config = json!({
        "method": "lsh",
        "parameter": { "hash_num": 64 },
        "nearest_neighbor_num": 10,
        "local_sensitivity": 1.0,
        "unlearner": "lru",
        "unlearner_parameter": lru
    });
    assert_eq!(
        create("nearest_neighbor", &config, &s).unwrap().name(),
        "nearest_neighbor:lsh"
    );
    assert_eq!(create("recommender", &config, &s).unwrap().name(), "recommender:lsh");
}

#[test]
fn invalid_unlearner_config() {
    let s = shared(LocalStorage::new());
    let config = json!({ "unlearner": "lru" });
    for name in ["perceptron", "PA"] {
        assert!(create(name, &config, &s).unwrap_err().is_config_error(), "{name}");
    }
}

#[test]
fn invalid_unlearner_name() {
    let s = shared(LocalStorage::new());
    let config = json!({
        "regularization_weight": 1.0,
        "unlearner": "Jubilee",
        "unlearner_parameter": { "max_size": 1 }
    });
    for name in ["PA1", "PA2", "AROw"] {
        assert!(create(name, &config, &s).unwrap_err().is_unsupported_method(), "{name}");
    }
}

#[test]
fn invalid_unlearner_parameter() {
    let s = shared(LocalStorage::new());
    let config = json!({ "regularization_weight": 1.0, "unlearner": "lru" });
    for name in REGULARIZED {
        assert!(create(name, &config, &s).unwrap_err().is_config_error(), "{name}");
    }
}

#[test]
fn regularization_weight_is_required_with_unlearner() {
    let s = shared(LocalStorage::new());
    let config = json!({
        "unlearner": "lru",
        "unlearner_parameter": { "max_size": 1 }
    });
    for name in REGULARIZED {
        match create(name, &config, &s).unwrap_err() {
            TesseraError::ConfigError { path, .. } => assert_eq!(path, "$.regularization_weight"),
            other => panic!("{name}: unexpected error {other:?}"),
        }
    }
}

#[test]
fn invalid_algorithm() {
    let s = shared(LocalStorage::new());
    let config = json!({
        "regularization_weight": 1.0,
        "unlearner": "lru",
        "unlearner_parameter": { "max_size": 1 }
    });
    for name in ["pa", "", "saitama", "Perceptron", "nherd"] {
        let err = create(name, &config, &s).unwrap_err();
        assert_eq!(err, TesseraError::unsupported(name));
    }
}

#[test]
fn unknown_name_wins_over_bad_config() {
    let s = shared(LocalStorage::new());
    let err = create("saitama", &json!({ "unlearner": 42 }), &s).unwrap_err();
    assert!(err.is_unsupported_method());
}

#[test]
fn neighbor_parameters_are_validated() {
    let s = shared(LocalStorage::new());
    let base = json!({
        "method": "lsh",
        "parameter": { "hash_num": 64 },
        "nearest_neighbor_num": 10,
        "local_sensitivity": 1.0
    });
    create("nearest_neighbor", &base, &s).unwrap();

    for (key, bad) in [
        ("nearest_neighbor_num", json!(0)),
        ("nearest_neighbor_num", Value::Null),
        ("local_sensitivity", json!(-1.0)),
        ("local_sensitivity", json!("high")),
        ("parameter", json!({ "hash_num": 0 })),
        ("method", json!(7)),
    ] {
        let mut config = base.clone();
        config[key] = bad.clone();
        let err = create("nearest_neighbor", &config, &s).unwrap_err();
        assert!(err.is_config_error(), "{key} = {bad}: {err:?}");
    }

    let mut config = base.clone();
    config["method"] = json!("euclid_lsh");
    assert!(create("recommender", &config, &s).unwrap_err().is_unsupported_method());
}

#[test]
fn failed_construction_leaves_storage_untouched() {
    let s = shared(LocalStorage::new());
    for k in ["a", "b", "c"] {
        s.write().unwrap().set(k, "label", Weight::new(1.0));
    }
    let config = json!({
        "unlearner": "lru",
        "unlearner_parameter": { "max_size": 1 }
    });
    // PA1 needs regularization_weight once an unlearner is set.
    assert!(create("PA1", &config, &s).is_err());
    assert_eq!(s.read().unwrap().len(), 3);

    // A successful build adopts and trims the existing rows.
    create("PA", &config, &s).unwrap();
    assert_eq!(s.read().unwrap().len(), 1);
}

#[test]
fn every_registered_name_builds() {
    let s = shared(LocalStorage::new());
    let config = json!({
        "regularization_weight": 0.5,
        "method": "inverted_index",
        "nearest_neighbor_num": 3,
        "local_sensitivity": 0.0
    });
    for name in CLASSIFIER_NAMES {
        create(name, &config, &s).unwrap();
    }
}
