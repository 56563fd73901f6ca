use super::*;
use crate::consts::SESSION_TIMEOUT_MS;
use crate::step::TOTAL_STEPS;

// =============================================================
// Step index normalization
// =============================================================

#[test]
fn missing_or_garbage_step_normalizes_to_zero() {
    assert_eq!(parse_step(None, TOTAL_STEPS), 0);
    assert_eq!(parse_step(Some(""), TOTAL_STEPS), 0);
    assert_eq!(parse_step(Some("NaN"), TOTAL_STEPS), 0);
    assert_eq!(parse_step(Some("banana"), TOTAL_STEPS), 0);
    assert_eq!(parse_step(Some("-1"), TOTAL_STEPS), 0);
    assert_eq!(parse_step(Some("2.5"), TOTAL_STEPS), 0);
}

#[test]
fn in_range_step_is_kept() {
    assert_eq!(parse_step(Some("0"), TOTAL_STEPS), 0);
    assert_eq!(parse_step(Some("2"), TOTAL_STEPS), 2);
    assert_eq!(parse_step(Some(" 3 "), TOTAL_STEPS), 3);
}

#[test]
fn out_of_range_step_clamps_to_last() {
    assert_eq!(parse_step(Some("7"), TOTAL_STEPS), TOTAL_STEPS - 1);
    assert_eq!(parse_step(Some("9999999"), TOTAL_STEPS), TOTAL_STEPS - 1);
}

// =============================================================
// Persistence round trip
// =============================================================

#[test]
fn persisted_session_round_trips() {
    let mut store = MemoryStore::new();
    persist(&mut store, "sess-1", 2);
    touch(&mut store, 1_000);

    let recovered = load(&store, TOTAL_STEPS).unwrap();
    assert_eq!(recovered.id, "sess-1");
    assert_eq!(recovered.step, 2);
    assert_eq!(recovered.last_activity, Some(1_000));
}

#[test]
fn clear_removes_every_key_together() {
    let mut store = MemoryStore::new();
    persist(&mut store, "sess-1", 1);
    touch(&mut store, 5);
    clear(&mut store);
    assert!(load(&store, TOTAL_STEPS).is_none());
    assert!(store.get(crate::consts::KEY_LAST_ACTIVITY).is_none());
}

#[test]
fn load_without_a_session_id_is_none() {
    let mut store = MemoryStore::new();
    touch(&mut store, 5);
    assert!(load(&store, TOTAL_STEPS).is_none());
}

#[test]
fn corrupt_last_activity_reads_as_none() {
    let mut store = MemoryStore::new();
    persist(&mut store, "sess-1", 0);
    store.set(crate::consts::KEY_LAST_ACTIVITY, "not-a-number");
    let recovered = load(&store, TOTAL_STEPS).unwrap();
    assert_eq!(recovered.last_activity, None);
}

// =============================================================
// Expiry arithmetic
// =============================================================

#[test]
fn expiry_is_inclusive_at_the_threshold() {
    assert!(!is_expired(SESSION_TIMEOUT_MS - 1, 0, SESSION_TIMEOUT_MS));
    assert!(is_expired(SESSION_TIMEOUT_MS, 0, SESSION_TIMEOUT_MS));
    assert!(is_expired(SESSION_TIMEOUT_MS + 1, 0, SESSION_TIMEOUT_MS));
}

#[test]
fn clock_going_backwards_does_not_expire() {
    assert!(!is_expired(100, 5_000, SESSION_TIMEOUT_MS));
}
