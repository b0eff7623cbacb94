use super::{MemoryStore, Store};
use crate::core::clock::ManualClock;
use std::time::Duration;

fn store_at(start_ns: i64) -> (ManualClock, MemoryStore<ManualClock>) {
    let clock = ManualClock::new(start_ns);
    let store = MemoryStore::builder().clock(clock.clone()).build();
    (clock, store)
}

#[test]
fn get_with_time_on_missing_key() {
    let (_, mut store) = store_at(42);

    let (value, now) = store.get_with_time("foo").unwrap();
    assert_eq!(value, None);
    assert_eq!(now, 42);
}

#[test]
fn set_if_not_exists_creates_once() {
    let (_, mut store) = store_at(0);

    assert!(
        store
            .set_if_not_exists_with_ttl("foo", 100, Duration::from_secs(10))
            .unwrap()
    );
    assert!(
        !store
            .set_if_not_exists_with_ttl("foo", 200, Duration::from_secs(10))
            .unwrap()
    );

    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, Some(100));
}

#[test]
fn set_if_not_exists_overwrites_an_expired_entry() {
    let (clock, mut store) = store_at(0);

    store
        .set_if_not_exists_with_ttl("foo", 100, Duration::from_secs(1))
        .unwrap();

    clock.advance(Duration::from_secs(2));
    assert!(
        store
            .set_if_not_exists_with_ttl("foo", 200, Duration::from_secs(1))
            .unwrap()
    );

    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, Some(200));
}

#[test]
fn compare_and_set_on_missing_key_returns_false() {
    let (_, mut store) = store_at(0);

    let swapped = store
        .compare_and_set_with_ttl("foo", 100, 200, Duration::from_secs(1))
        .unwrap();
    assert!(!swapped);

    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, None);
}

#[test]
fn compare_and_set_with_stale_old_value_returns_false() {
    let (_, mut store) = store_at(0);

    store
        .set_if_not_exists_with_ttl("foo", 100, Duration::from_secs(10))
        .unwrap();

    let swapped = store
        .compare_and_set_with_ttl("foo", 999, 200, Duration::from_secs(10))
        .unwrap();
    assert!(!swapped);

    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, Some(100));
}

#[test]
fn compare_and_set_with_matching_old_value_swaps_and_resets_ttl() {
    let (clock, mut store) = store_at(0);

    store
        .set_if_not_exists_with_ttl("foo", 100, Duration::from_secs(1))
        .unwrap();

    // Just before expiry, a successful swap renews the entry
    clock.advance(Duration::from_millis(900));
    assert!(
        store
            .compare_and_set_with_ttl("foo", 100, 200, Duration::from_secs(1))
            .unwrap()
    );

    // The old deadline has passed, the renewed entry is still live
    clock.advance(Duration::from_millis(500));
    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, Some(200));
}

#[test]
fn compare_and_set_on_expired_entry_returns_false() {
    let (clock, mut store) = store_at(0);

    store
        .set_if_not_exists_with_ttl("foo", 100, Duration::from_secs(1))
        .unwrap();

    clock.advance(Duration::from_secs(2));
    let swapped = store
        .compare_and_set_with_ttl("foo", 100, 200, Duration::from_secs(1))
        .unwrap();
    assert!(!swapped);
}

#[test]
fn entries_expire_after_their_ttl() {
    let (clock, mut store) = store_at(0);

    store
        .set_if_not_exists_with_ttl("foo", 100, Duration::from_secs(1))
        .unwrap();

    clock.advance(Duration::from_millis(999));
    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, Some(100));

    clock.advance(Duration::from_millis(1));
    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, None);
}

#[test]
fn zero_ttl_is_clamped_to_the_smallest_unit() {
    let (clock, mut store) = store_at(0);

    store
        .set_if_not_exists_with_ttl("foo", 100, Duration::ZERO)
        .unwrap();

    // Live at the instant of the write, gone one nanosecond later
    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, Some(100));

    clock.advance(Duration::from_nanos(1));
    let (value, _) = store.get_with_time("foo").unwrap();
    assert_eq!(value, None);
}

#[test]
fn observed_time_never_regresses() {
    let (clock, mut store) = store_at(1_000);

    let (_, now) = store.get_with_time("foo").unwrap();
    assert_eq!(now, 1_000);

    // Clock jumping backwards (e.g. NTP step) is clamped
    clock.set(500);
    let (_, now) = store.get_with_time("foo").unwrap();
    assert_eq!(now, 1_000);

    clock.set(2_000);
    let (_, now) = store.get_with_time("foo").unwrap();
    assert_eq!(now, 2_000);
}

#[test]
fn periodic_cleanup_sweeps_expired_entries() {
    let clock = ManualClock::new(0);
    let mut store = MemoryStore::builder()
        .clock(clock.clone())
        .cleanup_interval(Duration::from_secs(10))
        .build();

    for i in 0..5 {
        store
            .set_if_not_exists_with_ttl(&format!("key{i}"), i, Duration::from_secs(1))
            .unwrap();
    }
    assert_eq!(store.len(), 5);

    // All entries are expired but the sweep has not run yet
    clock.advance(Duration::from_secs(5));
    let (value, _) = store.get_with_time("key0").unwrap();
    assert_eq!(value, None);
    assert_eq!(store.len(), 5);

    // First write past the cleanup interval sweeps the dead entries
    clock.advance(Duration::from_secs(6));
    store
        .set_if_not_exists_with_ttl("fresh", 1, Duration::from_secs(1))
        .unwrap();
    assert_eq!(store.len(), 1);
}
