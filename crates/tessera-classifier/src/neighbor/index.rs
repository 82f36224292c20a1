use std::cmp::Ordering;

/// Finds stored rows close to a query vector.
///
/// Indexes are derived state: the rows themselves live in the classifier's
/// storage, and an index can always be rebuilt from it. Deletion is lazy,
/// so queries take a residency predicate and skip ids the storage no longer
/// holds.
pub trait SimilarityIndex: Send + Sync + std::fmt::Debug {
    /// Method name, `inverted_index` or `lsh`.
    fn name(&self) -> &'static str;

    /// Adds or replaces the row `id`.
    fn insert(&mut self, id: &str, fv: &[(String, f64)]);

    /// Forgets `id`. Returns `true` if it was indexed.
    fn remove(&mut self, id: &str) -> bool;

    /// Up to `k` resident rows closest to `fv`, nearest first, as
    /// `(id, distance)` with distance in `[0, 2]`.
    fn neighbors(
        &self,
        fv: &[(String, f64)],
        k: usize,
        is_resident: &dyn Fn(&str) -> bool,
    ) -> Vec<(String, f64)>;

    /// Every indexed id.
    fn ids(&self) -> Vec<String>;

    /// Number of indexed rows.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is indexed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every row.
    fn clear(&mut self);
}

/// Keeps the `k` nearest of `candidates`, ties broken by id.
pub(crate) fn nearest(mut candidates: Vec<(String, f64)>, k: usize) -> Vec<(String, f64)> {
    candidates.sort_by(|(ia, da), (ib, db)| {
        da.partial_cmp(db)
            .unwrap_or(Ordering::Equal)
            .then_with(|| ia.cmp(ib))
    });
    candidates.truncate(k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_sorts_and_truncates() {
        let picked = nearest(
            vec![
                ("c".into(), 0.5),
                ("b".into(), 0.1),
                ("a".into(), 0.5),
                ("d".into(), 0.9),
            ],
            3,
        );
        let ids: Vec<_> = picked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
