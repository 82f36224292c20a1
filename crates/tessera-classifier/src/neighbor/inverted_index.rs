use std::collections::HashMap;

use super::index::{nearest, SimilarityIndex};

/// Exact cosine similarity through a feature → rows posting list.
///
/// Only rows sharing at least one feature with the query are candidates.
/// Distance is `1 - cos`.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, HashMap<String, f64>>,
    rows: HashMap<String, Vec<(String, f64)>>,
    norms: HashMap<String, f64>,
}

impl InvertedIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

fn norm(fv: &[(String, f64)]) -> f64 {
    fv.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
}

impl SimilarityIndex for InvertedIndex {
    fn name(&self) -> &'static str {
        "inverted_index"
    }

    fn insert(&mut self, id: &str, fv: &[(String, f64)]) {
        self.remove(id);
        for (feature, value) in fv {
            self.postings
                .entry(feature.clone())
                .or_default()
                .insert(id.to_string(), *value);
        }
        self.norms.insert(id.to_string(), norm(fv));
        self.rows.insert(id.to_string(), fv.to_vec());
    }

    fn remove(&mut self, id: &str) -> bool {
        let Some(fv) = self.rows.remove(id) else {
            return false;
        };
        for (feature, _) in fv {
            if let Some(posting) = self.postings.get_mut(&feature) {
                posting.remove(id);
                if posting.is_empty() {
                    self.postings.remove(&feature);
                }
            }
        }
        self.norms.remove(id);
        true
    }

    fn neighbors(
        &self,
        fv: &[(String, f64)],
        k: usize,
        is_resident: &dyn Fn(&str) -> bool,
    ) -> Vec<(String, f64)> {
        let query_norm = norm(fv);
        if query_norm == 0.0 || k == 0 {
            return Vec::new();
        }
        let mut dots: HashMap<&str, f64> = HashMap::new();
        for (feature, x) in fv {
            let Some(posting) = self.postings.get(feature) else {
                continue;
            };
            for (id, w) in posting {
                *dots.entry(id.as_str()).or_default() += x * w;
            }
        }
        let candidates = dots
            .into_iter()
            .filter(|(id, _)| is_resident(*id))
            .filter_map(|(id, dot)| {
                let row_norm = self.norms.get(id).copied().unwrap_or(0.0);
                (row_norm > 0.0).then(|| (id.to_string(), 1.0 - dot / (query_norm * row_norm)))
            })
            .collect();
        nearest(candidates, k)
    }

    fn ids(&self) -> Vec<String> {
        self.rows.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn clear(&mut self) {
        self.postings.clear();
        self.rows.clear();
        self.norms.clear();
    }
}
