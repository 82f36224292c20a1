//! The eviction policy contract and its construction from config.

use std::num::NonZeroUsize;

use serde::Deserialize;
use tessera_core::{Config, TesseraError};

use crate::lru::LruUnlearner;
use crate::random::RandomUnlearner;

/// Names accepted by [`create_unlearner`].
pub const UNLEARNER_NAMES: &[&str] = &["lru", "random"];

/// Chooses which resident key to give up when a new key arrives at capacity.
///
/// An unlearner only tracks key names; the storage decorator does the
/// actual removal. New strategies plug in by implementing this trait, the
/// [`tessera_core::Storage`] contract stays untouched.
pub trait Unlearner: Send + std::fmt::Debug {
    /// Registered policy name.
    fn name(&self) -> &'static str;

    /// Maximum number of resident keys.
    fn max_size(&self) -> usize;

    /// Records a write to `key`.
    ///
    /// If `key` is not yet resident and the policy is full, one resident key
    /// is chosen, forgotten, and returned; the caller must remove it from the
    /// storage before writing `key`.
    fn touch(&mut self, key: &str) -> Option<String>;

    /// Records a read of a resident key. Never admits new keys.
    fn refresh(&mut self, key: &str);

    /// Forgets `key`. Returns `true` if it was tracked.
    fn remove(&mut self, key: &str) -> bool;

    /// Returns `true` if `key` is tracked as resident.
    fn contains(&self, key: &str) -> bool;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every key.
    fn clear(&mut self);
}

#[derive(Debug, Deserialize)]
struct LruParameter {
    max_size: NonZeroUsize,
}

#[derive(Debug, Deserialize)]
struct RandomParameter {
    max_size: NonZeroUsize,
    #[serde(default)]
    seed: Option<u64>,
}

/// Default seed for the random policy when none is configured.
pub const DEFAULT_RANDOM_SEED: u64 = 0x5eed;

/// Builds the unlearner described by a classifier config, if any.
///
/// Reads `unlearner` (policy name) and `unlearner_parameter`
/// (`max_size`, plus an optional `seed` for `"random"`). Returns
/// `Ok(None)` when no unlearner is configured.
///
/// # Errors
///
/// - [`TesseraError::UnsupportedMethod`] for an unregistered policy name.
/// - [`TesseraError::ConfigError`] if `unlearner` is not a string, or the
///   parameter block is missing, or `max_size` is missing or not a
///   positive integer.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tessera_core::Config;
/// use tessera_unlearn::create_unlearner;
///
/// let config = Config::new(json!({
///     "unlearner": "lru",
///     "unlearner_parameter": { "max_size": 2 }
/// }));
/// let unlearner = create_unlearner(&config).unwrap().unwrap();
/// assert_eq!(unlearner.name(), "lru");
/// assert_eq!(unlearner.max_size(), 2);
///
/// let missing = Config::new(json!({ "unlearner": "lru" }));
/// assert!(create_unlearner(&missing).unwrap_err().is_config_error());
///
/// let unknown = Config::new(json!({ "unlearner": "Jubilee" }));
/// assert!(create_unlearner(&unknown).unwrap_err().is_unsupported_method());
/// ```
pub fn create_unlearner(config: &Config) -> Result<Option<Box<dyn Unlearner>>, TesseraError> {
    let Some(name) = config.get("unlearner") else {
        return Ok(None);
    };
    let name = name.as_str()?;
    if !UNLEARNER_NAMES.contains(&name) {
        return Err(TesseraError::unsupported(name));
    }
    let parameter = config.require("unlearner_parameter")?;

    let unlearner: Box<dyn Unlearner> = match name {
        "lru" => {
            let p: LruParameter = parameter.deserialize()?;
            Box::new(LruUnlearner::new(p.max_size))
        }
        "random" => {
            let p: RandomParameter = parameter.deserialize()?;
            Box::new(RandomUnlearner::new(
                p.max_size,
                p.seed.unwrap_or(DEFAULT_RANDOM_SEED),
            ))
        }
        other => return Err(TesseraError::unsupported(other)),
    };
    Ok(Some(unlearner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_unlearner_is_none() {
        assert!(create_unlearner(&Config::default()).unwrap().is_none());
        let config = Config::new(json!({ "unlearner": null }));
        assert!(create_unlearner(&config).unwrap().is_none());
    }

    #[test]
    fn names_are_case_sensitive() {
        for name in ["LRU", "Lru", "", "lru "] {
            let config = Config::new(json!({
                "unlearner": name,
                "unlearner_parameter": { "max_size": 1 }
            }));
            let err = create_unlearner(&config).unwrap_err();
            assert!(err.is_unsupported_method(), "{name:?} accepted");
        }
    }

    #[test]
    fn max_size_must_be_positive_integer() {
        for bad in [json!(0), json!(-1), json!(2.5), json!("3"), json!(null)] {
            let config = Config::new(json!({
                "unlearner": "lru",
                "unlearner_parameter": { "max_size": bad }
            }));
            let err = create_unlearner(&config).unwrap_err();
            assert!(err.is_config_error(), "max_size {bad} accepted");
        }
    }

    #[test]
    fn non_string_name_is_config_error() {
        let config = Config::new(json!({ "unlearner": 3 }));
        assert!(create_unlearner(&config).unwrap_err().is_config_error());
    }

    #[test]
    fn random_accepts_optional_seed() {
        let config = Config::new(json!({
            "unlearner": "random",
            "unlearner_parameter": { "max_size": 4, "seed": 9 }
        }));
        let unlearner = create_unlearner(&config).unwrap().unwrap();
        assert_eq!(unlearner.name(), "random");
        assert_eq!(unlearner.max_size(), 4);

        let config = Config::new(json!({
            "unlearner": "random",
            "unlearner_parameter": { "max_size": 4 }
        }));
        assert!(create_unlearner(&config).unwrap().is_some());
    }

    #[test]
    fn config_error_points_at_parameter_block() {
        let config = Config::new(json!({
            "unlearner": "lru",
            "unlearner_parameter": {}
        }));
        match create_unlearner(&config).unwrap_err() {
            TesseraError::ConfigError { path, message } => {
                assert_eq!(path, "$.unlearner_parameter");
                assert!(message.contains("max_size"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
