//! The distributed mixing contract.
//!
//! Every model that takes part in a mixing round implements
//! [`LinearMixable`]: it can report its local contribution
//! ([`LinearMixable::get_diff`]), combine two contributions
//! ([`LinearMixable::mix`]) and apply a merged one
//! ([`LinearMixable::put_diff`]). The merge must be commutative and
//! associative so that diffs arriving in any order converge to the same
//! result.
//!
//! [`MixableHelper`] wraps such a model for the mixing scheduler and tags
//! every diff with the model's [`Version`], rejecting merged diffs that
//! were computed against a different version.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::TesseraError;
use crate::version::Version;

/// A model that can be merged with its peers by exchanging diffs.
///
/// All methods take `&self`; implementations guard their own state.
pub trait LinearMixable: Send + Sync {
    /// The unit exchanged between nodes.
    type Diff: Clone + Send + Sync + std::fmt::Debug;

    /// Snapshot of the local contribution. Must not mutate state.
    fn get_diff(&self) -> Self::Diff;

    /// Applies a merged diff. Returns `false` and leaves state unchanged
    /// if the diff cannot be applied safely.
    fn put_diff(&self, diff: &Self::Diff) -> bool;

    /// Combines two diffs. Must be commutative and associative.
    fn mix(&self, lhs: &Self::Diff, rhs: &Self::Diff) -> Self::Diff;

    /// Current state version.
    fn version(&self) -> Version;

    /// Serializes the full model state.
    fn pack(&self) -> Result<Vec<u8>, TesseraError>;

    /// Replaces the model state with a packed snapshot.
    fn unpack(&self, bytes: &[u8]) -> Result<(), TesseraError>;
}

/// A diff tagged with the version it was computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<D> {
    /// Version of the producing model (max over merged inputs).
    pub version: Version,
    /// The payload.
    pub diff: D,
}

/// Adapts a [`LinearMixable`] model into a versioned mixing participant.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tessera_core::mixable::MixableHelper;
/// use tessera_core::storage::{LocalStorage, Storage, Weight};
/// use tessera_core::LinearMixable;
/// # use std::sync::RwLock;
/// # use tessera_core::{storage::StorageDiff, TesseraError, Version};
/// # struct Model(RwLock<LocalStorage>);
/// # impl LinearMixable for Model {
/// #     type Diff = StorageDiff;
/// #     fn get_diff(&self) -> StorageDiff { self.0.read().unwrap().get_diff() }
/// #     fn put_diff(&self, d: &StorageDiff) -> bool { self.0.write().unwrap().put_diff(d) }
/// #     fn mix(&self, l: &StorageDiff, r: &StorageDiff) -> StorageDiff { StorageDiff::merge(l, r) }
/// #     fn version(&self) -> Version { self.0.read().unwrap().version() }
/// #     fn pack(&self) -> Result<Vec<u8>, TesseraError> { self.0.read().unwrap().pack() }
/// #     fn unpack(&self, b: &[u8]) -> Result<(), TesseraError> { self.0.write().unwrap().unpack(b) }
/// # }
///
/// let mut storage = LocalStorage::new();
/// storage.set("f", "a", Weight::new(1.0));
/// let helper = MixableHelper::new(Arc::new(Model(RwLock::new(storage))));
///
/// let diff = helper.get_diff();
/// let merged = helper.mix(&diff, &diff);
/// assert!(helper.put_diff(&merged));
///
/// // The version moved on, so the same merged diff is now stale.
/// assert!(!helper.put_diff(&merged));
/// ```
pub struct MixableHelper<M: LinearMixable + ?Sized> {
    model: Arc<M>,
    /// Serializes version check plus apply; shared by every clone.
    apply: Arc<Mutex<()>>,
}

impl<M: LinearMixable + ?Sized> Clone for MixableHelper<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<M: LinearMixable + ?Sized> MixableHelper<M> {
    /// Wraps a shared model.
    ///
    /// Clones of the returned helper share its apply lock. A second
    /// `new` over the same model does not, so hand out clones rather than
    /// wrapping a model twice.
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            apply: Arc::new(Mutex::new(())),
        }
    }

    /// The wrapped model.
    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Current model version.
    pub fn version(&self) -> Version {
        self.model.version()
    }

    /// The model's diff, tagged with its current version.
    pub fn get_diff(&self) -> Versioned<M::Diff> {
        let version = self.model.version();
        Versioned {
            version,
            diff: self.model.get_diff(),
        }
    }

    /// Merges two tagged diffs; the result carries the newer version.
    pub fn mix(&self, lhs: &Versioned<M::Diff>, rhs: &Versioned<M::Diff>) -> Versioned<M::Diff> {
        Versioned {
            version: lhs.version.max(rhs.version),
            diff: self.model.mix(&lhs.diff, &rhs.diff),
        }
    }

    /// Applies a merged diff if it was computed against the local version.
    ///
    /// Returns `false` for stale diffs and for diffs the model rejects;
    /// the caller should then resynchronize from a peer's packed state.
    pub fn put_diff(&self, diff: &Versioned<M::Diff>) -> bool {
        let _guard = self.apply.lock().unwrap_or_else(PoisonError::into_inner);
        let local = self.model.version();
        if diff.version != local {
            tracing::warn!(local = %local, remote = %diff.version, "rejecting stale diff");
            return false;
        }
        let applied = self.model.put_diff(&diff.diff);
        if applied {
            tracing::debug!(version = %self.model.version(), "applied merged diff");
        } else {
            tracing::warn!(version = %local, "model rejected merged diff");
        }
        applied
    }

    /// Serializes the wrapped model.
    pub fn pack(&self) -> Result<Vec<u8>, TesseraError> {
        self.model.pack()
    }

    /// Restores the wrapped model from a packed snapshot.
    pub fn unpack(&self, bytes: &[u8]) -> Result<(), TesseraError> {
        let _guard = self.apply.lock().unwrap_or_else(PoisonError::into_inner);
        self.model.unpack(bytes)
    }
}
