//! Path-aware view over a JSON configuration value.
//!
//! Parsing the configuration text is somebody else's job; components
//! receive an already parsed [`serde_json::Value`] and read it through
//! [`Config`], which remembers where in the document each value came from
//! so that every [`TesseraError::ConfigError`] names the exact entry.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TesseraError;

/// A JSON configuration value together with its path from the root.
///
/// `null` behaves like an empty object: lookups on it find nothing.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tessera_core::Config;
///
/// let config = Config::new(json!({
///     "unlearner": "lru",
///     "unlearner_parameter": { "max_size": 10 }
/// }));
///
/// let max_size = config
///     .require("unlearner_parameter")
///     .and_then(|p| p.require("max_size"))
///     .and_then(|v| v.as_positive_usize())
///     .unwrap();
/// assert_eq!(max_size, 10);
///
/// let err = config.require("method").unwrap_err();
/// assert_eq!(err.to_string(), "config error at $.method: is required");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    value: Value,
    path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl From<Value> for Config {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl Config {
    /// Wraps a root configuration value.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            path: "$".to_string(),
        }
    }

    /// JSON path of this value, `$` for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw JSON value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns `true` if the value is `null`.
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Returns `true` if `key` is present with a non-null value.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Looks up a member. Missing members and explicit `null`s both
    /// yield `None`.
    pub fn get(&self, key: &str) -> Option<Config> {
        match self.value.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(Config {
                value: v.clone(),
                path: format!("{}.{}", self.path, key),
            }),
        }
    }

    /// Looks up a member that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::ConfigError`] if the member is missing or `null`.
    pub fn require(&self, key: &str) -> Result<Config, TesseraError> {
        self.get(key)
            .ok_or_else(|| TesseraError::config(format!("{}.{}", self.path, key), "is required"))
    }

    /// Reads the value as a string.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::ConfigError`] if the value is not a string.
    pub fn as_str(&self) -> Result<&str, TesseraError> {
        self.value
            .as_str()
            .ok_or_else(|| self.type_error("a string"))
    }

    /// Reads the value as a number.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::ConfigError`] if the value is not numeric.
    pub fn as_f64(&self) -> Result<f64, TesseraError> {
        self.value
            .as_f64()
            .ok_or_else(|| self.type_error("a number"))
    }

    /// Reads the value as a strictly positive integer.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::ConfigError`] if the value is not an
    /// integer, is zero, or is negative.
    pub fn as_positive_usize(&self) -> Result<usize, TesseraError> {
        match self.value.as_u64() {
            Some(0) => Err(TesseraError::config(&self.path, "must be positive")),
            Some(n) => usize::try_from(n)
                .map_err(|_| TesseraError::config(&self.path, "is too large")),
            None if self.value.as_i64().is_some() => {
                Err(TesseraError::config(&self.path, "must be positive"))
            }
            None => Err(self.type_error("an integer")),
        }
    }

    /// Deserializes the whole value into a typed parameter block.
    ///
    /// `null` is deserialized as an empty object so that blocks made
    /// entirely of optional fields accept an absent section.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::ConfigError`] carrying the serde message.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, TesseraError> {
        let value = match &self.value {
            Value::Null => Value::Object(serde_json::Map::new()),
            v => v.clone(),
        };
        serde_json::from_value(value).map_err(|e| TesseraError::config(&self.path, e.to_string()))
    }

    fn type_error(&self, expected: &str) -> TesseraError {
        TesseraError::config(&self.path, format!("expected {expected}, got {}", self.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn null_behaves_like_empty_object() {
        let config = Config::new(Value::Null);
        assert!(config.is_null());
        assert!(config.get("anything").is_none());
        assert!(!config.contains("anything"));
    }

    #[test]
    fn explicit_null_member_is_absent() {
        let config = Config::new(json!({ "unlearner": null }));
        assert!(!config.contains("unlearner"));
    }

    #[test]
    fn nested_paths_are_tracked() {
        let config = Config::new(json!({ "parameter": { "hash_num": "many" } }));
        let err = config
            .require("parameter")
            .and_then(|p| p.require("hash_num"))
            .and_then(|v| v.as_positive_usize())
            .unwrap_err();
        match err {
            TesseraError::ConfigError { path, .. } => assert_eq!(path, "$.parameter.hash_num"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn positive_usize_rejects_zero_negative_and_fractions() {
        for bad in [json!(0), json!(-3), json!(1.5), json!("1")] {
            let config = Config::new(json!({ "n": bad }));
            let result = config.require("n").and_then(|v| v.as_positive_usize());
            assert!(result.unwrap_err().is_config_error());
        }
        let config = Config::new(json!({ "n": 64 }));
        assert_eq!(config.require("n").unwrap().as_positive_usize().unwrap(), 64);
    }

    #[test]
    fn numbers_accept_integers_and_floats() {
        let config = Config::new(json!({ "a": 1, "b": 0.25 }));
        assert_eq!(config.require("a").unwrap().as_f64().unwrap(), 1.0);
        assert_eq!(config.require("b").unwrap().as_f64().unwrap(), 0.25);
        assert!(config.require("a").unwrap().as_str().is_err());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Block {
        #[serde(default)]
        seed: Option<u64>,
    }

    #[test]
    fn deserialize_treats_null_as_empty_object() {
        let block: Block = Config::new(Value::Null).deserialize().unwrap();
        assert_eq!(block, Block { seed: None });

        let err = Config::new(json!({ "seed": "x" }))
            .deserialize::<Block>()
            .unwrap_err();
        assert!(err.is_config_error());
    }
}
