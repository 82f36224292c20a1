//! # tessera-stat
//!
//! Windowed statistics for the Tessera runtime.
//!
//! [`Stat`] keeps per-key running aggregates (count, sum, sum of squares,
//! max, min) over a bounded, insertion-ordered window of observations and
//! answers `sum`, `stddev`, `max`, `min`, `moment` and `entropy` queries.
//! It is also the reference implementation of
//! [`tessera_core::LinearMixable`]: nodes exchange [`StatDiff`]s
//! (entropy, observation count) and merge them by count-weighted average.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use tessera_stat::{MixableStat, Stat};
//!
//! let node_a = MixableStat::new(Arc::new(Stat::new(100)));
//! let node_b = MixableStat::new(Arc::new(Stat::new(100)));
//! node_a.model().push("cpu", 0.7);
//! node_b.model().push("mem", 0.3);
//! node_b.model().push("cpu", 0.3);
//!
//! let merged = node_a.mix(&node_a.get_diff(), &node_b.get_diff());
//! assert!(node_a.put_diff(&merged));
//! assert!(node_b.put_diff(&merged));
//! assert_eq!(node_a.model().mixed_entropy(), node_b.model().mixed_entropy());
//! ```
//!
//! ## Architecture Rules
//!
//! - Depends only on `tessera-core`.
//! - No threads of its own; callers bring the learning and mixing threads.
//! - One `RwLock` per engine, never held across calls out of the engine.

mod diff;
mod stat;
mod window;

pub use diff::StatDiff;
pub use stat::{MixableStat, Stat};
pub use window::{StatVal, WindowEntry};

pub use tessera_core;
