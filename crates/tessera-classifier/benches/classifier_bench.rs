use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use tessera_classifier::{create_classifier, ClassifierHandle};
use tessera_core::storage::{shared, LocalStorage};
use tessera_core::{Config, SparseVector};

fn vector(i: usize, width: usize) -> SparseVector {
    (0..width)
        .map(|j| (format!("f{}", (i * 7 + j) % 512), 1.0 + j as f64 / 10.0))
        .collect()
}

fn classifier(name: &str, config: serde_json::Value) -> ClassifierHandle {
    create_classifier(name, &Config::new(config), shared(LocalStorage::new())).unwrap()
}

fn bench_arow_train(c: &mut Criterion) {
    c.bench_function("AROW train (32 features, lru 256)", |b| {
        let arow = classifier(
            "AROW",
            json!({
                "regularization_weight": 1.0,
                "unlearner": "lru",
                "unlearner_parameter": { "max_size": 256 }
            }),
        );
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            let label = if i % 3 == 0 { "a" } else { "b" };
            arow.train(black_box(&vector(i, 32)), label);
        })
    });
}

fn bench_neighbor_classify(c: &mut Criterion) {
    for method in ["inverted_index", "lsh"] {
        let neighbors = classifier(
            "recommender",
            json!({
                "method": method,
                "parameter": { "hash_num": 64 },
                "nearest_neighbor_num": 10,
                "local_sensitivity": 1.0
            }),
        );
        for i in 0..1000 {
            neighbors.train(&vector(i, 16), if i % 2 == 0 { "even" } else { "odd" });
        }
        c.bench_function(&format!("recommender:{method} classify (1000 rows)"), |b| {
            let query = vector(17, 16);
            b.iter(|| black_box(neighbors.classify_with_scores(black_box(&query))))
        });
    }
}

criterion_group!(benches, bench_arow_train, bench_neighbor_classify);
criterion_main!(benches);
