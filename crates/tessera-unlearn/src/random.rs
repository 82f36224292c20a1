//! Uniformly random eviction.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::rng::SimpleRng;
use crate::unlearner::Unlearner;

/// Evicts a uniformly chosen resident key. Reads do not matter.
///
/// Keys live in a vector with a position index so both eviction and
/// removal are O(1) swap-removes.
#[derive(Debug, Clone)]
pub struct RandomUnlearner {
    max_size: usize,
    keys: Vec<String>,
    positions: HashMap<String, usize>,
    rng: SimpleRng,
}

impl RandomUnlearner {
    /// Creates an empty random policy holding at most `max_size` keys.
    pub fn new(max_size: NonZeroUsize, seed: u64) -> Self {
        Self {
            max_size: max_size.get(),
            keys: Vec::new(),
            positions: HashMap::new(),
            rng: SimpleRng::new(seed),
        }
    }

    fn swap_remove(&mut self, index: usize) -> String {
        let key = self.keys.swap_remove(index);
        self.positions.remove(&key);
        if let Some(moved) = self.keys.get(index) {
            self.positions.insert(moved.clone(), index);
        }
        key
    }
}

impl Unlearner for RandomUnlearner {
    fn name(&self) -> &'static str {
        "random"
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn touch(&mut self, key: &str) -> Option<String> {
        if self.positions.contains_key(key) {
            return None;
        }
        let victim = if self.keys.len() >= self.max_size {
            let index = self.rng.next_index(self.keys.len());
            Some(self.swap_remove(index))
        } else {
            None
        };
        self.positions.insert(key.to_string(), self.keys.len());
        self.keys.push(key.to_string());
        victim
    }

    fn refresh(&mut self, _key: &str) {}

    fn remove(&mut self, key: &str) -> bool {
        match self.positions.get(key).copied() {
            Some(index) => {
                self.swap_remove(index);
                true
            }
            None => false,
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random(n: usize, seed: u64) -> RandomUnlearner {
        RandomUnlearner::new(NonZeroUsize::new(n).unwrap(), seed)
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut u = random(5, 3);
        let mut evicted = 0;
        for i in 0..100 {
            if u.touch(&format!("k{i}")).is_some() {
                evicted += 1;
            }
            assert!(u.len() <= 5);
        }
        assert_eq!(evicted, 95);
        assert!(u.contains("k99"));
    }

    #[test]
    fn victim_was_resident() {
        let mut u = random(3, 11);
        for k in ["a", "b", "c"] {
            u.touch(k);
        }
        let victim = u.touch("d").unwrap();
        assert!(["a", "b", "c"].contains(&victim.as_str()));
        assert!(!u.contains(&victim));
    }

    #[test]
    fn same_seed_same_choices() {
        let run = |seed| {
            let mut u = random(2, seed);
            (0..20).filter_map(|i| u.touch(&format!("k{i}"))).collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn positions_stay_consistent_after_removal() {
        let mut u = random(4, 1);
        for k in ["a", "b", "c", "d"] {
            u.touch(k);
        }
        assert!(u.remove("a"));
        assert!(u.remove("d"));
        assert!(!u.remove("a"));
        assert_eq!(u.len(), 2);
        assert!(u.contains("b") && u.contains("c"));
        assert!(u.remove("c"));
        assert!(u.remove("b"));
        assert!(u.is_empty());
    }
}
