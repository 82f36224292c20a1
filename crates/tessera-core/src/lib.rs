//! # tessera-core
//!
//! Shared vocabulary for the Tessera online-learning runtime.
//!
//! ## Key Components
//!
//! - [`TesseraError`]: the single error enum used across the workspace
//! - [`Config`]: path-aware view over a parsed JSON configuration
//! - [`Storage`]: the key→weight access contract, with [`LocalStorage`]
//!   as the in-process implementation and [`SharedStorage`] as the handle
//!   passed between components
//! - [`LinearMixable`]: the get_diff / mix / put_diff contract every
//!   mixable model implements, and [`MixableHelper`], which versions it
//!
//! ## Architecture Rules
//!
//! - No dependency on any other `tessera-*` crate.
//! - No threads and no network code; transports live outside the workspace.
//! - Nothing here panics on bad input: errors are returned as
//!   [`TesseraError`].

pub mod config;
pub mod error;
pub mod fv;
pub mod mixable;
pub mod storage;
pub mod sync;
pub mod version;

pub use config::Config;
pub use error::TesseraError;
pub use fv::SparseVector;
pub use mixable::{LinearMixable, MixableHelper, Versioned};
pub use storage::{LocalStorage, SharedStorage, Storage, StorageDiff, Weight};
pub use version::Version;
