//! Algebraic laws of the statistics merge.

use proptest::prelude::*;
use tessera_stat::StatDiff;

fn diff() -> impl Strategy<Value = StatDiff> {
    (0.0f64..20.0, 0u64..1_000).prop_map(|(value, count)| StatDiff::new(value, count))
}

fn close(a: &StatDiff, b: &StatDiff) -> bool {
    a.count == b.count && (a.value - b.value).abs() <= 1e-9 * (1.0 + a.value.abs())
}

proptest! {
    #[test]
    fn merge_is_commutative(a in diff(), b in diff()) {
        prop_assert!(close(&StatDiff::merge(&a, &b), &StatDiff::merge(&b, &a)));
    }

    #[test]
    fn merge_is_associative(a in diff(), b in diff(), c in diff()) {
        let left = StatDiff::merge(&StatDiff::merge(&a, &b), &c);
        let right = StatDiff::merge(&a, &StatDiff::merge(&b, &c));
        let shuffled = StatDiff::merge(&StatDiff::merge(&a, &c), &b);
        prop_assert!(close(&left, &right));
        prop_assert!(close(&left, &shuffled));
    }

    #[test]
    fn merged_value_stays_between_inputs(a in diff(), b in diff()) {
        let m = StatDiff::merge(&a, &b);
        prop_assert_eq!(m.count, a.count + b.count);
        if a.count > 0 && b.count > 0 {
            let lo = a.value.min(b.value) - 1e-9;
            let hi = a.value.max(b.value) + 1e-9;
            prop_assert!(m.value >= lo && m.value <= hi);
        }
    }
}
