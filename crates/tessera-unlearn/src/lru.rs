//! Least-recently-used eviction.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;

use crate::unlearner::Unlearner;

/// Evicts the key whose last touch is oldest.
///
/// Every touch stamps the key with a fresh tick; the ordered tick index
/// makes finding the oldest key O(log n).
///
/// # Example
///
/// ```
/// use std::num::NonZeroUsize;
/// use tessera_unlearn::{LruUnlearner, Unlearner};
///
/// let mut lru = LruUnlearner::new(NonZeroUsize::new(2).unwrap());
/// assert_eq!(lru.touch("a"), None);
/// assert_eq!(lru.touch("b"), None);
/// lru.refresh("a");
/// assert_eq!(lru.touch("c"), Some("b".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct LruUnlearner {
    max_size: usize,
    tick: u64,
    stamps: HashMap<String, u64>,
    order: BTreeMap<u64, String>,
}

impl LruUnlearner {
    /// Creates an empty LRU policy holding at most `max_size` keys.
    pub fn new(max_size: NonZeroUsize) -> Self {
        Self {
            max_size: max_size.get(),
            tick: 0,
            stamps: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    fn stamp(&mut self, key: &str) {
        self.tick += 1;
        if let Some(old) = self.stamps.insert(key.to_string(), self.tick) {
            self.order.remove(&old);
        }
        self.order.insert(self.tick, key.to_string());
    }

    fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }
}

impl Unlearner for LruUnlearner {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn touch(&mut self, key: &str) -> Option<String> {
        if self.stamps.contains_key(key) {
            self.stamp(key);
            return None;
        }
        let victim = if self.stamps.len() >= self.max_size {
            self.pop_oldest()
        } else {
            None
        };
        self.stamp(key);
        victim
    }

    fn refresh(&mut self, key: &str) {
        if self.stamps.contains_key(key) {
            self.stamp(key);
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.stamps.remove(key) {
            Some(tick) => {
                self.order.remove(&tick);
                true
            }
            None => false,
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.stamps.contains_key(key)
    }

    fn len(&self) -> usize {
        self.stamps.len()
    }

    fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
    }
}
