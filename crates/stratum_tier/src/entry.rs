// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    ops::Deref,
    time::{Duration, SystemTime},
};

/// A cached value with associated metadata.
///
/// `CacheEntry` wraps a value with an optional TTL and the moment the value was cached.
/// Tiers stamp the timestamp on insertion and use both fields to decide expiry.
///
/// # Examples
///
/// ```
/// use stratum_tier::CacheEntry;
/// use std::time::Duration;
///
/// // Simple entry with just a value
/// let entry = CacheEntry::new(42);
/// assert_eq!(*entry.value(), 42);
///
/// // Entry with per-entry TTL
/// let entry = CacheEntry::with_ttl("data".to_string(), Duration::from_secs(60));
/// assert_eq!(entry.ttl(), Some(Duration::from_secs(60)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    cached_at: Option<SystemTime>,
    /// Per-entry TTL override. If set, takes precedence over tier-level TTL.
    ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    /// Creates a new cache entry with the given value.
    ///
    /// The timestamp will be set by the tier when the entry is inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_tier::CacheEntry;
    ///
    /// let entry = CacheEntry::new(42);
    /// assert_eq!(*entry.value(), 42);
    /// assert!(entry.cached_at().is_none());
    /// ```
    pub fn new(value: V) -> Self {
        Self {
            value,
            cached_at: None,
            ttl: None,
        }
    }

    /// Creates a new cache entry with a per-entry TTL.
    ///
    /// The per-entry TTL takes precedence over any tier-level TTL.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_tier::CacheEntry;
    /// use std::time::Duration;
    ///
    /// let entry = CacheEntry::with_ttl(42, Duration::from_secs(300));
    /// assert_eq!(entry.ttl(), Some(Duration::from_secs(300)));
    /// ```
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: None,
            ttl: Some(ttl),
        }
    }

    /// Creates an entry that was cached at `cached_at` and lives for `ttl`.
    ///
    /// This is typically used by tiers when handing stored entries back to callers.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_tier::CacheEntry;
    /// use std::time::{Duration, SystemTime};
    ///
    /// let at = SystemTime::UNIX_EPOCH;
    /// let entry = CacheEntry::expires_at(42, Duration::from_secs(10), at);
    /// assert_eq!(entry.expiry(), Some(at + Duration::from_secs(10)));
    /// ```
    pub fn expires_at(value: V, ttl: Duration, cached_at: SystemTime) -> Self {
        Self {
            value,
            cached_at: Some(cached_at),
            ttl: Some(ttl),
        }
    }

    /// Returns the timestamp when this entry was cached.
    ///
    /// Returns `None` if the entry hasn't been inserted yet.
    #[must_use]
    pub fn cached_at(&self) -> Option<SystemTime> {
        self.cached_at
    }

    /// Sets the timestamp when this entry was cached.
    pub fn set_cached_at(&mut self, cached_at: SystemTime) {
        self.cached_at = Some(cached_at);
    }

    /// Sets the timestamp only if none has been recorded yet.
    pub fn ensure_cached_at(&mut self, now: SystemTime) {
        if self.cached_at.is_none() {
            self.cached_at = Some(now);
        }
    }

    /// Returns the per-entry TTL, if set.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Sets the per-entry TTL.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = Some(ttl);
    }

    /// Returns the absolute moment this entry expires, if it has both a timestamp and a TTL.
    #[must_use]
    pub fn expiry(&self) -> Option<SystemTime> {
        self.cached_at?.checked_add(self.ttl?)
    }

    /// Returns `true` if the entry is strictly older than its TTL at `now`.
    ///
    /// An entry without a TTL never expires. An entry with a TTL but no timestamp
    /// is treated as expired, since its age cannot be established.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };

        match self.cached_at {
            Some(cached_at) => match now.duration_since(cached_at) {
                Ok(age) => age > ttl,
                // The clock went backwards, the entry is younger than zero.
                Err(_) => false,
            },
            None => true,
        }
    }

    /// Returns how long the entry has left to live at `now`.
    ///
    /// Returns `None` if the entry has no expiry.
    #[must_use]
    pub fn remaining_at(&self, now: SystemTime) -> Option<Duration> {
        let expiry = self.expiry()?;
        Some(expiry.duration_since(now).unwrap_or(Duration::ZERO))
    }

    /// Consumes the entry and returns the inner value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<V> Deref for CacheEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<V> From<V> for CacheEntry<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}
