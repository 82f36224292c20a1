//! UnlearningStorage: a capacity-bounded decorator over any storage.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tessera_core::storage::{Row, StorageDiff};
use tessera_core::{sync, SharedStorage, Storage, TesseraError, Version, Weight};

use crate::unlearner::Unlearner;

/// Wraps a [`SharedStorage`] and keeps at most `max_size` rows resident in
/// it, evicting the row chosen by its [`Unlearner`] before a new row is
/// written.
///
/// The decorator does not copy rows; everything lives in the wrapped
/// storage. Reads of resident rows count as touches.
///
/// # Example
///
/// ```
/// use std::num::NonZeroUsize;
/// use tessera_core::storage::{shared, LocalStorage};
/// use tessera_core::{Storage, Weight};
/// use tessera_unlearn::{LruUnlearner, UnlearningStorage};
///
/// let inner = shared(LocalStorage::new());
/// let lru = LruUnlearner::new(NonZeroUsize::new(2).unwrap());
/// let mut storage = UnlearningStorage::new(inner.clone(), Box::new(lru));
///
/// storage.set("a", "x", Weight::new(1.0));
/// storage.set("b", "x", Weight::new(1.0));
/// storage.get("a");
/// storage.set("c", "x", Weight::new(1.0));
///
/// // "b" was least recently touched.
/// let inner = inner.read().unwrap();
/// assert_eq!(inner.len(), 2);
/// assert!(inner.contains("a") && inner.contains("c"));
/// ```
pub struct UnlearningStorage {
    inner: SharedStorage,
    unlearner: Mutex<Box<dyn Unlearner>>,
}

impl std::fmt::Debug for UnlearningStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlearningStorage")
            .field("unlearner", &*self.policy())
            .finish_non_exhaustive()
    }
}

impl UnlearningStorage {
    /// Wraps `inner`, adopting the rows it already holds.
    ///
    /// If `inner` holds more rows than the policy allows, the excess is
    /// evicted immediately.
    pub fn new(inner: SharedStorage, unlearner: Box<dyn Unlearner>) -> Self {
        let storage = Self {
            inner,
            unlearner: Mutex::new(unlearner),
        };
        storage.adopt_resident_keys();
        storage
    }

    /// Name of the eviction policy.
    pub fn unlearner_name(&self) -> &'static str {
        self.policy().name()
    }

    /// Maximum number of resident rows.
    pub fn max_size(&self) -> usize {
        self.policy().max_size()
    }

    /// The wrapped storage.
    pub fn inner(&self) -> &SharedStorage {
        &self.inner
    }

    fn policy(&self) -> MutexGuard<'_, Box<dyn Unlearner>> {
        self.unlearner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn adopt_resident_keys(&self) {
        let mut inner = sync::write(&self.inner);
        let mut policy = self.policy();
        policy.clear();
        let mut keys = inner.keys();
        keys.sort();
        for key in keys {
            if let Some(victim) = policy.touch(&key) {
                tracing::trace!(victim = %victim, policy = policy.name(), "evicting row on adoption");
                inner.remove(&victim);
            }
        }
    }
}

impl Storage for UnlearningStorage {
    fn get(&self, key: &str) -> Option<Row> {
        let row = sync::read(&self.inner).get(key);
        if row.is_some() {
            self.policy().refresh(key);
        }
        row
    }

    fn set(&mut self, key: &str, column: &str, weight: Weight) {
        let victim = self.policy().touch(key);
        let mut inner = sync::write(&self.inner);
        if let Some(victim) = victim {
            tracing::trace!(victim = %victim, incoming = key, "evicting row");
            inner.remove(&victim);
        }
        inner.set(key, column, weight);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.policy().remove(key);
        sync::write(&self.inner).remove(key)
    }

    fn remove_column(&mut self, column: &str) -> usize {
        let mut inner = sync::write(&self.inner);
        let before = inner.keys();
        let hits = inner.remove_column(column);
        let mut policy = self.policy();
        for key in before.iter().filter(|k| !inner.contains(k)) {
            policy.remove(key);
        }
        hits
    }

    fn contains(&self, key: &str) -> bool {
        sync::read(&self.inner).contains(key)
    }

    fn keys(&self) -> Vec<String> {
        sync::read(&self.inner).keys()
    }

    fn len(&self) -> usize {
        sync::read(&self.inner).len()
    }

    fn clear(&mut self) {
        sync::write(&self.inner).clear();
        self.policy().clear();
    }

    fn version(&self) -> Version {
        sync::read(&self.inner).version()
    }

    fn get_diff(&self) -> StorageDiff {
        sync::read(&self.inner).get_diff()
    }

    /// Applies the merged diff to the wrapped storage, then admits every
    /// row it touched through the policy so the capacity bound holds again.
    fn put_diff(&mut self, diff: &StorageDiff) -> bool {
        let mut inner = sync::write(&self.inner);
        if !inner.put_diff(diff) {
            return false;
        }
        let mut policy = self.policy();
        for key in diff.keys() {
            if let Some(victim) = policy.touch(key) {
                tracing::trace!(victim = %victim, incoming = key, "evicting row after mix");
                inner.remove(&victim);
            }
        }
        true
    }

    fn pack(&self) -> Result<Vec<u8>, TesseraError> {
        sync::read(&self.inner).pack()
    }

    fn unpack(&mut self, bytes: &[u8]) -> Result<(), TesseraError> {
        sync::write(&self.inner).unpack(bytes)?;
        self.adopt_resident_keys();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "unlearning"
    }
}
