//! Monotonic state versions used to detect stale diffs.

use serde::{Deserialize, Serialize};

/// Marker attached to mixable state. Advances by one on every accepted
/// merged diff, so two nodes that took part in the same mixing rounds
/// report the same version.
///
/// # Example
///
/// ```
/// use tessera_core::Version;
///
/// let mut v = Version::default();
/// v.increment();
/// assert_eq!(v.get(), 1);
/// assert!(v > Version::default());
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Creates a version from a raw counter.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Advances the version by one.
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
