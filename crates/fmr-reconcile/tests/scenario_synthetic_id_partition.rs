//! The 2^48 partition is an external contract: analytics queries select
//! synthetic rows with `event_id > 2^48` and real rows with `event_id < 2^48`.

use fmr_reconcile::*;

#[test]
fn scenario_synthetic_ids_land_above_the_base() {
    assert_eq!(SYNTHETIC_EVENT_BASE, 1_i64 << 48);
    assert_eq!(synthetic_event_id(12345), SYNTHETIC_EVENT_BASE + 12345);
    assert!(is_synthetic(synthetic_event_id(12345)));
}

#[test]
fn scenario_real_ids_are_not_synthetic() {
    assert!(!is_synthetic(12345));
    // The base itself is excluded by the strict comparison.
    assert!(!is_synthetic(SYNTHETIC_EVENT_BASE));
}

#[test]
fn scenario_derivation_is_stable_for_synthetic_sources() {
    // Re-emitting for a source that is already synthetic must target the same
    // row, not stack another offset on top.
    let first = synthetic_event_id(777);
    let second = synthetic_event_id(first);
    assert_eq!(first, second);
}

#[test]
fn scenario_distinct_sources_never_collide() {
    let a = synthetic_event_id(1);
    let b = synthetic_event_id(2);
    assert_ne!(a, b);
}
