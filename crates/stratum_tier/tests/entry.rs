// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `CacheEntry`.

use std::time::{Duration, SystemTime};

use stratum_tier::CacheEntry;

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

#[test]
fn new_creates_entry_without_metadata() {
    let entry = CacheEntry::new("test_value");
    assert_eq!(*entry.value(), "test_value");
    assert!(entry.cached_at().is_none());
    assert!(entry.ttl().is_none());
    assert!(entry.expiry().is_none());
}

#[test]
fn with_ttl_creates_entry_with_ttl() {
    let ttl = Duration::from_secs(300);
    let entry = CacheEntry::with_ttl("value", ttl);
    assert_eq!(entry.ttl(), Some(ttl));
    assert!(entry.cached_at().is_none());
}

#[test]
fn expires_at_sets_both_fields() {
    let entry = CacheEntry::expires_at("value", Duration::from_secs(60), at(1_000));
    assert_eq!(entry.cached_at(), Some(at(1_000)));
    assert_eq!(entry.expiry(), Some(at(1_060)));
}

#[test]
fn ensure_cached_at_keeps_existing_timestamp() {
    let mut entry = CacheEntry::new("value");
    entry.ensure_cached_at(at(5));
    entry.ensure_cached_at(at(9));
    assert_eq!(entry.cached_at(), Some(at(5)));

    entry.set_cached_at(at(9));
    assert_eq!(entry.cached_at(), Some(at(9)));
}

#[test]
fn expiry_is_strict() {
    let entry = CacheEntry::expires_at("value", Duration::from_secs(60), at(0));
    assert!(!entry.is_expired_at(at(59)));
    assert!(!entry.is_expired_at(at(60)));
    assert!(entry.is_expired_at(at(60) + Duration::from_millis(1)));
}

#[test]
fn entry_without_ttl_never_expires() {
    let mut entry = CacheEntry::new("value");
    entry.set_cached_at(at(0));
    assert!(!entry.is_expired_at(at(u64::from(u32::MAX))));
    assert!(entry.remaining_at(at(10)).is_none());
}

#[test]
fn entry_with_ttl_but_no_timestamp_is_expired() {
    let entry = CacheEntry::with_ttl("value", Duration::from_secs(60));
    assert!(entry.is_expired_at(at(0)));
}

#[test]
fn clock_going_backwards_does_not_expire() {
    let entry = CacheEntry::expires_at("value", Duration::from_secs(1), at(100));
    assert!(!entry.is_expired_at(at(50)));
}

#[test]
fn remaining_counts_down_to_zero() {
    let entry = CacheEntry::expires_at("value", Duration::from_secs(300), at(0));
    assert_eq!(entry.remaining_at(at(0)), Some(Duration::from_secs(300)));
    assert_eq!(entry.remaining_at(at(120)), Some(Duration::from_secs(180)));
    assert_eq!(entry.remaining_at(at(400)), Some(Duration::ZERO));
}

#[test]
fn set_ttl_updates_ttl() {
    let mut entry = CacheEntry::new("value");
    entry.set_ttl(Duration::from_secs(60));
    assert_eq!(entry.ttl(), Some(Duration::from_secs(60)));
}

#[test]
fn into_value_consumes_entry() {
    let entry = CacheEntry::new("owned_value".to_string());
    assert_eq!(entry.into_value(), "owned_value");
}

#[test]
fn deref_returns_value_reference() {
    let entry = CacheEntry::new(42i32);
    let val: &i32 = &entry;
    assert_eq!(*val, 42);
}

#[test]
fn from_creates_entry_from_value() {
    let entry: CacheEntry<String> = "test".to_string().into();
    assert_eq!(*entry.value(), "test");
    assert!(entry.ttl().is_none());
}
