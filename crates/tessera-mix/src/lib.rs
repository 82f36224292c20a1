//! # tessera-mix
//!
//! Drives the linear mixing protocol between in-process nodes.
//!
//! - [`LinearMixer`]: one get_diff / mix / put_diff round over every
//!   registered [`tessera_core::MixableHelper`], plus resynchronization of
//!   nodes that fell behind
//! - [`MixerHandle`]: a background thread running rounds on an interval
//!
//! Transports between processes are out of scope; a networked deployment
//! ships the same `Versioned` diffs over its own RPC layer.

mod mixer;

pub use mixer::{LinearMixer, MixReport, MixerHandle};

pub use tessera_core;
