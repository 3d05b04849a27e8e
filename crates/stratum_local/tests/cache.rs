// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `LocalCache`.

use std::num::NonZeroUsize;
use std::time::Duration;

use stratum_local::LocalCache;
use stratum_tier::{CacheEntry, CacheTier, Expiry};
use tick::ClockControl;

static_assertions::assert_impl_all!(LocalCache<String, String>: Send, Sync, std::fmt::Debug);

const MINUTE: Duration = Duration::from_secs(60);

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn bounded(capacity: usize, control: &ClockControl) -> LocalCache<String, i32> {
    LocalCache::builder(&control.to_clock())
        .capacity(NonZeroUsize::new(capacity).expect("non-zero capacity"))
        .build()
}

fn key(name: &str) -> String {
    name.to_string()
}

#[test]
fn round_trip_before_expiry() {
    let control = ClockControl::new();
    let cache = bounded(5, &control);

    cache.set(key("1"), 42, MINUTE);
    control.advance(Duration::from_secs(59));
    assert_eq!(cache.get(&key("1")), Some(42));
}

#[test]
fn get_on_missing_key_is_absent() {
    let control = ClockControl::new();
    let cache = bounded(5, &control);
    assert_eq!(cache.get(&key("missing")), None);
    assert!(cache.is_empty());
}

#[test]
fn entry_at_exactly_ttl_is_still_live() {
    let control = ClockControl::new();
    let cache = bounded(5, &control);

    cache.set(key("1"), 1, MINUTE);
    control.advance(MINUTE);
    assert_eq!(cache.get(&key("1")), Some(1));

    control.advance(Duration::from_millis(1));
    assert_eq!(cache.get(&key("1")), None);
}

#[test]
fn expired_entry_is_removed_on_access() {
    let control = ClockControl::new();
    let cache = bounded(5, &control);

    cache.set(key("1"), 1, MINUTE);
    control.advance(Duration::from_secs(61));

    assert_eq!(cache.len(), 1, "expiry is lazy");
    assert_eq!(cache.get(&key("1")), None);
    assert_eq!(cache.len(), 0);
}

#[test]
fn capacity_evicts_least_recently_used() {
    let control = ClockControl::new();
    let cache = bounded(5, &control);

    for (id, value) in ["1", "2", "3", "4", "5"].into_iter().zip(1..) {
        assert_eq!(cache.set(key(id), value, MINUTE), None);
    }

    let evicted = cache.set(key("6"), 6, MINUTE);
    assert_eq!(evicted, Some((key("1"), 1)));
    assert_eq!(cache.len(), 5);
    assert!(!cache.contains_key(&key("1")));
}

#[test]
fn hit_refreshes_recency() {
    let control = ClockControl::new();
    let cache = bounded(3, &control);

    cache.set(key("a"), 1, MINUTE);
    cache.set(key("b"), 2, MINUTE);
    cache.set(key("c"), 3, MINUTE);
    assert_eq!(cache.get(&key("a")), Some(1));

    let evicted = cache.set(key("d"), 4, MINUTE);
    assert_eq!(evicted, Some((key("b"), 2)));
    assert_eq!(cache.set(key("e"), 5, MINUTE), Some((key("c"), 3)));
}

#[test]
fn peek_does_not_refresh_recency() {
    let control = ClockControl::new();
    let cache = bounded(2, &control);

    cache.set(key("a"), 1, MINUTE);
    cache.set(key("b"), 2, MINUTE);
    assert_eq!(cache.peek(&key("a")), Some(1));

    let evicted = cache.set(key("c"), 3, MINUTE);
    assert_eq!(evicted, Some((key("a"), 1)));
}

#[test]
fn size_never_exceeds_capacity() {
    let control = ClockControl::new();
    let cache = bounded(3, &control);

    for i in 0..50 {
        let _ = cache.set(format!("k{i}"), i, MINUTE);
        if i % 3 == 0 {
            let _ = cache.get(&format!("k{}", i / 2));
        }
        assert!(cache.len() <= 3);
    }
}

#[test]
fn evict_expired_removes_only_stale_entries() {
    let control = ClockControl::new();
    let cache = bounded(5, &control);

    cache.set(key("short"), 1, Duration::from_secs(5));
    cache.set(key("long"), 2, MINUTE);
    control.advance(Duration::from_secs(10));

    assert_eq!(cache.evict_expired(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&key("long")), Some(2));
}

#[test]
fn remaining_ttl_counts_down() {
    let control = ClockControl::new();
    let cache = bounded(5, &control);

    cache.set(key("1"), 1, MINUTE);
    control.advance(Duration::from_secs(20));
    assert_eq!(cache.remaining_ttl(&key("1")), Some(Duration::from_secs(40)));
    assert_eq!(cache.remaining_ttl(&key("2")), None);

    control.advance(Duration::from_secs(41));
    assert_eq!(cache.remaining_ttl(&key("1")), None);
}

#[test]
fn invalidate_and_clear() {
    let control = ClockControl::new();
    let cache = bounded(5, &control);

    cache.set(key("a"), 1, MINUTE);
    cache.set(key("b"), 2, MINUTE);

    assert_eq!(cache.invalidate(&key("a")), Some(1));
    assert_eq!(cache.invalidate(&key("a")), None);
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
    assert!(!cache.contains_key(&key("b")));
}

#[test]
fn builder_settings_are_reported() {
    let control = ClockControl::new();
    let cache = LocalCache::<String, i32>::builder(&control.to_clock())
        .capacity(NonZeroUsize::new(7).expect("non-zero capacity"))
        .time_to_live(MINUTE)
        .name("products")
        .build();

    assert_eq!(cache.capacity().get(), 7);
    assert_eq!(cache.time_to_live(), Some(MINUTE));
    assert_eq!(cache.name(), Some("products"));
}

#[test]
fn tier_insert_uses_default_ttl() {
    block_on(async {
        let control = ClockControl::new();
        let cache = LocalCache::<String, i32>::builder(&control.to_clock())
            .time_to_live(MINUTE)
            .build();

        CacheTier::insert(&cache, &key("a"), CacheEntry::new(1)).await.expect("insert failed");
        CacheTier::insert(&cache, &key("b"), CacheEntry::with_ttl(2, Duration::from_secs(5)))
            .await
            .expect("insert failed");

        control.advance(Duration::from_secs(10));

        let a = CacheTier::get(&cache, &key("a")).await.expect("get failed").expect("entry missing");
        assert_eq!(*a.value(), 1);
        assert_eq!(a.ttl(), Some(MINUTE));
        assert!(a.cached_at().is_some());

        assert!(CacheTier::get(&cache, &key("b")).await.expect("get failed").is_none());
    });
}

#[test]
fn tier_without_default_ttl_keeps_entries() {
    block_on(async {
        let control = ClockControl::new();
        let cache = bounded(5, &control);

        CacheTier::insert(&cache, &key("a"), CacheEntry::new(1)).await.expect("insert failed");
        control.advance(Duration::from_secs(86_400));

        let entry = CacheTier::get(&cache, &key("a")).await.expect("get failed").expect("entry missing");
        assert!(entry.ttl().is_none());
        assert_eq!(CacheTier::remaining_ttl(&cache, &key("a")).await.expect("remaining_ttl failed"), Expiry::Never);
        assert_eq!(CacheTier::remaining_ttl(&cache, &key("b")).await.expect("remaining_ttl failed"), Expiry::Absent);
    });
}

#[test]
fn tier_len_invalidate_and_clear() {
    block_on(async {
        let control = ClockControl::new();
        let cache = bounded(5, &control);

        CacheTier::insert(&cache, &key("a"), CacheEntry::new(1)).await.expect("insert failed");
        CacheTier::insert(&cache, &key("b"), CacheEntry::new(2)).await.expect("insert failed");
        assert_eq!(CacheTier::len(&cache), Some(2));

        CacheTier::invalidate(&cache, &key("a")).await.expect("invalidate failed");
        assert_eq!(CacheTier::len(&cache), Some(1));

        CacheTier::clear(&cache).await.expect("clear failed");
        assert_eq!(CacheTier::is_empty(&cache), Some(true));
    });
}
