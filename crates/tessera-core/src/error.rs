//! Error types shared by every Tessera crate.

use thiserror::Error;

/// The error type returned by all fallible Tessera operations.
///
/// Construction failures come in two kinds: an unknown name
/// ([`TesseraError::UnsupportedMethod`]) and a recognized mode whose
/// parameters are missing or invalid ([`TesseraError::ConfigError`]).
/// Both are raised before any state is created or mutated.
///
/// # Example
///
/// ```
/// use tessera_core::TesseraError;
///
/// let err = TesseraError::unsupported("saitama");
/// assert!(err.is_unsupported_method());
/// assert_eq!(err.to_string(), "unsupported method: saitama");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TesseraError {
    /// An algorithm, unlearner or similarity method name is not registered.
    #[error("unsupported method: {name}")]
    UnsupportedMethod {
        /// The rejected name, verbatim.
        name: String,
    },

    /// A recognized mode is missing a parameter or has an invalid value.
    #[error("config error at {path}: {message}")]
    ConfigError {
        /// JSON path of the offending entry, e.g. `$.unlearner_parameter.max_size`.
        path: String,
        /// What was wrong with it.
        message: String,
    },

    /// Packing or unpacking model state failed.
    #[error("serialization error: {message}")]
    SerializationError {
        /// Underlying serializer message.
        message: String,
    },

    /// Invariant violation inside a component.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violation.
        message: String,
    },
}

impl TesseraError {
    /// Shorthand for [`TesseraError::UnsupportedMethod`].
    pub fn unsupported(name: impl Into<String>) -> Self {
        Self::UnsupportedMethod { name: name.into() }
    }

    /// Shorthand for [`TesseraError::ConfigError`].
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for [`TesseraError::UnsupportedMethod`].
    pub fn is_unsupported_method(&self) -> bool {
        matches!(self, Self::UnsupportedMethod { .. })
    }

    /// Returns `true` for [`TesseraError::ConfigError`].
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_path() {
        let err = TesseraError::config("$.unlearner_parameter.max_size", "must be positive");
        assert_eq!(
            err.to_string(),
            "config error at $.unlearner_parameter.max_size: must be positive"
        );
        assert!(err.is_config_error());
        assert!(!err.is_unsupported_method());
    }

    #[test]
    fn serde_errors_become_serialization_errors() {
        let err: TesseraError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, TesseraError::SerializationError { .. }));
    }
}
