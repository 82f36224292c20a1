//! End-to-end behavior: training through the factory, mixing between
//! nodes, and bounded memory under an unlearner.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use tessera_classifier::{create_classifier, Classifier, ClassifierHandle};
use tessera_core::fv::from_pairs;
use tessera_core::storage::{shared, LocalStorage};
use tessera_core::{Config, MixableHelper, SharedStorage, Storage};

fn node(
    name: &str,
    config: serde_json::Value,
) -> (SharedStorage, MixableHelper<dyn Classifier>) {
    let storage = shared(LocalStorage::new());
    let classifier: ClassifierHandle =
        create_classifier(name, &Config::new(config), storage.clone()).unwrap();
    (storage, MixableHelper::new(classifier))
}

fn round(nodes: &[&MixableHelper<dyn Classifier>]) {
    let diffs: Vec<_> = nodes.iter().map(|n| n.get_diff()).collect();
    let merged = diffs[1..]
        .iter()
        .fold(diffs[0].clone(), |acc, d| nodes[0].mix(&acc, d));
    for n in nodes {
        assert!(n.put_diff(&merged));
    }
}

#[test]
fn linear_nodes_converge_after_mixing() {
    let config = json!({ "regularization_weight": 1.0 });
    let (_, a) = node("AROW", config.clone());
    let (_, b) = node("AROW", config);

    let sports = from_pairs(&[("goal", 1.0), ("match", 1.0)]);
    let politics = from_pairs(&[("vote", 1.0), ("senate", 1.0)]);
    for _ in 0..3 {
        a.model().train(&sports, "sports");
        b.model().train(&politics, "politics");
    }
    round(&[&a, &b]);

    for n in [&a, &b] {
        assert_eq!(n.model().get_labels(), vec!["politics", "sports"]);
        assert_eq!(n.version().get(), 1);
    }
    assert_eq!(
        a.model().classify_with_scores(&sports),
        b.model().classify_with_scores(&sports)
    );
    assert_eq!(a.model().classify(&politics).as_deref(), Some("politics"));
    assert_eq!(b.model().classify(&sports).as_deref(), Some("sports"));
}

#[test]
fn stale_diff_is_rejected() {
    let (_, a) = node("PA", json!({}));
    let (_, b) = node("PA", json!({}));
    a.model().train(&from_pairs(&[("x", 1.0)]), "a");
    round(&[&a, &b]);

    // b misses the second round and falls behind.
    a.model().train(&from_pairs(&[("y", 1.0)]), "b");
    let (_, c) = node("PA", json!({}));
    let merged = a.mix(&a.get_diff(), &c.get_diff());
    assert!(a.put_diff(&merged));
    assert!(!c.put_diff(&merged));
    assert!(!b.put_diff(&a.get_diff()));
    assert_eq!(b.version().get(), 1);

    b.unpack(&a.pack().unwrap()).unwrap();
    assert_eq!(b.version(), a.version());
    assert_eq!(b.model().get_labels(), a.model().get_labels());
}

#[test]
fn unlearner_bounds_memory_while_training() {
    let (inner, a) = node(
        "PA1",
        json!({
            "regularization_weight": 1.0,
            "unlearner": "lru",
            "unlearner_parameter": { "max_size": 8 }
        }),
    );
    for i in 0..100 {
        let word = format!("w{i}");
        let fv = from_pairs(&[(word.as_str(), 1.0), ("bias", 1.0)]);
        a.model().train(&fv, if i % 2 == 0 { "even" } else { "odd" });
        assert!(inner.read().unwrap().len() <= 8);
    }
    // The shared feature is touched by every example and stays resident.
    assert!(inner.read().unwrap().contains("bias"));
}

#[test]
fn neighbor_nodes_share_examples() {
    let config = json!({
        "method": "inverted_index",
        "nearest_neighbor_num": 2,
        "local_sensitivity": 0.5,
        "unlearner": "random",
        "unlearner_parameter": { "max_size": 16, "seed": 3 },
        "regularization_weight": 1.0
    });
    let (_, a) = node("recommender", config.clone());
    let (_, b) = node("recommender", config);
    a.model().train(&from_pairs(&[("red", 1.0)]), "warm");
    b.model().train(&from_pairs(&[("blue", 1.0)]), "cold");
    round(&[&a, &b]);

    let blue = a.model().classify(&from_pairs(&[("blue", 1.0)]));
    let red = b.model().classify(&from_pairs(&[("red", 1.0)]));
    assert_eq!(blue.as_deref(), Some("cold"));
    assert_eq!(red.as_deref(), Some("warm"));
}

#[test]
fn learning_and_mixing_threads_share_a_classifier() {
    let (_, a) = node("CW", json!({ "regularization_weight": 1.0 }));
    let (_, b) = node("CW", json!({ "regularization_weight": 1.0 }));
    let a = Arc::new(a);

    let learner = {
        let a = Arc::clone(&a);
        thread::spawn(move || {
            for i in 0..200 {
                let label = if i % 2 == 0 { "x" } else { "y" };
                a.model().train(&from_pairs(&[(label, 1.0)]), label);
            }
        })
    };
    for _ in 0..20 {
        let merged = a.mix(&a.get_diff(), &b.get_diff());
        let _ = a.put_diff(&merged);
        let _ = b.put_diff(&merged);
    }
    learner.join().unwrap();

    let label = a.model().classify(&from_pairs(&[("x", 1.0)]));
    assert_eq!(label.as_deref(), Some("x"));
}
