//! Minimal sparse feature vectors.

/// A sparse feature vector: `(feature name, value)` pairs.
///
/// Feature extraction lives upstream; learning algorithms only need to
/// iterate the non-zero entries.
pub type SparseVector = Vec<(String, f64)>;

/// Sum of squared values.
///
/// # Example
///
/// ```
/// use tessera_core::fv::squared_norm;
///
/// let fv = vec![("a".to_string(), 3.0), ("b".to_string(), 4.0)];
/// assert_eq!(squared_norm(&fv), 25.0);
/// ```
pub fn squared_norm(fv: &[(String, f64)]) -> f64 {
    fv.iter().map(|(_, v)| v * v).sum()
}

/// Builds a vector from borrowed pairs. Handy in tests and examples.
pub fn from_pairs(pairs: &[(&str, f64)]) -> SparseVector {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
