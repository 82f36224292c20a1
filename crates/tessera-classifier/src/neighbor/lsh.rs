use std::collections::HashMap;
use std::f64::consts::PI;

use tessera_unlearn::rng::SimpleRng;

use super::index::{nearest, SimilarityIndex};

/// Random-hyperplane LSH.
///
/// Each row is reduced to a `hash_num`-bit signature; bit `j` is the sign of
/// the row's projection onto hyperplane `j`. Hyperplane components are
/// derived from the feature name alone, so every node computes the same
/// signature for the same row. The angle between two vectors is estimated
/// from the Hamming distance of their signatures and reported as
/// `1 - cos(angle)`.
#[derive(Debug)]
pub struct LshIndex {
    hash_num: usize,
    signatures: HashMap<String, Vec<u64>>,
}

impl LshIndex {
    /// Creates an index producing `hash_num`-bit signatures.
    pub fn new(hash_num: usize) -> Self {
        Self {
            hash_num,
            signatures: HashMap::new(),
        }
    }

    /// Signature length in bits.
    pub fn hash_num(&self) -> usize {
        self.hash_num
    }

    fn signature(&self, fv: &[(String, f64)]) -> Vec<u64> {
        let mut projections = vec![0.0; self.hash_num];
        for (feature, x) in fv {
            let mut rng = SimpleRng::new(fnv1a(feature.as_bytes()));
            for p in projections.iter_mut() {
                *p += x * unit(rng.next_u64());
            }
        }
        let mut bits = vec![0u64; self.hash_num.div_ceil(64)];
        for (j, p) in projections.iter().enumerate() {
            if *p > 0.0 {
                bits[j / 64] |= 1 << (j % 64);
            }
        }
        bits
    }
}

/// FNV-1a, stable across platforms and builds.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325, |h, b| {
        (h ^ u64::from(*b)).wrapping_mul(0x100000001b3)
    })
}

/// Maps a random word onto `[-1, 1)`.
fn unit(r: u64) -> f64 {
    (r >> 11) as f64 / (1u64 << 52) as f64 - 1.0
}

fn hamming(a: &[u64], b: &[u64]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

impl SimilarityIndex for LshIndex {
    fn name(&self) -> &'static str {
        "lsh"
    }

    fn insert(&mut self, id: &str, fv: &[(String, f64)]) {
        let signature = self.signature(fv);
        self.signatures.insert(id.to_string(), signature);
    }

    fn remove(&mut self, id: &str) -> bool {
        self.signatures.remove(id).is_some()
    }

    fn neighbors(
        &self,
        fv: &[(String, f64)],
        k: usize,
        is_resident: &dyn Fn(&str) -> bool,
    ) -> Vec<(String, f64)> {
        if k == 0 {
            return Vec::new();
        }
        let query = self.signature(fv);
        let bits = self.hash_num as f64;
        let candidates = self
            .signatures
            .iter()
            .filter(|(id, _)| is_resident(id.as_str()))
            .map(|(id, signature)| {
                let angle = PI * f64::from(hamming(&query, signature)) / bits;
                (id.clone(), 1.0 - angle.cos())
            })
            .collect();
        nearest(candidates, k)
    }

    fn ids(&self) -> Vec<String> {
        self.signatures.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.signatures.len()
    }

    fn clear(&mut self) {
        self.signatures.clear();
    }
}
