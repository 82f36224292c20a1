//! # tessera-unlearn
//!
//! Capacity-bounded eviction ("unlearning") for Tessera storages.
//!
//! - [`Unlearner`]: the policy contract, choosing which resident key to give up
//! - [`LruUnlearner`] (`"lru"`) and [`RandomUnlearner`] (`"random"`)
//! - [`UnlearningStorage`]: a [`tessera_core::Storage`] decorator that
//!   keeps the wrapped storage within the policy's `max_size`
//! - [`create_unlearner`]: builds a policy from a classifier config
//!
//! ## Architecture Rules
//!
//! - Depends only on `tessera-core`.
//! - Policies track key names only; rows are removed by the decorator.
//! - The decorator composes over a shared storage; it never copies rows.

pub mod rng;

mod lru;
mod random;
mod storage;
mod unlearner;

pub use lru::LruUnlearner;
pub use random::RandomUnlearner;
pub use storage::UnlearningStorage;
pub use unlearner::{create_unlearner, Unlearner, DEFAULT_RANDOM_SEED, UNLEARNER_NAMES};

pub use tessera_core;
