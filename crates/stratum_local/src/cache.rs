// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use stratum_tier::Expiry;
use tick::Clock;

use crate::builder::LocalCacheBuilder;

/// A bounded in-process cache with strict least-recently-used eviction.
///
/// Every successful [`get`](Self::get) refreshes the entry's recency. When a new key is
/// written into a full cache, the entry accessed longest ago is evicted and handed back to
/// the caller. Entries are stamped from a monotonic counter on every write and hit, so two
/// entries never tie and an earlier insertion is always evicted first.
///
/// Expiry is lazy. An entry whose age is strictly greater than its TTL behaves exactly like
/// a missing key and is removed when encountered. [`set`](Self::set) also sweeps expired
/// entries before deciding whether an eviction is needed.
///
/// All operations are synchronous; the state sits behind a single [`parking_lot::Mutex`].
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use std::time::Duration;
///
/// use stratum_local::LocalCache;
/// use tick::ClockControl;
///
/// let control = ClockControl::new();
/// let cache = LocalCache::<u32, &str>::builder(&control.to_clock()).build();
///
/// cache.set(1, "Laptop", Duration::from_secs(60));
/// assert_eq!(cache.get(&1), Some("Laptop"));
///
/// control.advance(Duration::from_secs(61));
/// assert_eq!(cache.get(&1), None);
/// ```
pub struct LocalCache<K, V> {
    state: Mutex<State<K, V>>,
    capacity: NonZeroUsize,
    time_to_live: Option<Duration>,
    name: Option<String>,
    clock: Clock,
}

struct State<K, V> {
    slots: HashMap<K, Slot<V>>,
    // Recency stamp to key, oldest first.
    recency: BTreeMap<u64, K>,
    next_stamp: u64,
}

struct Slot<V> {
    value: V,
    cached_at: SystemTime,
    inserted: Instant,
    ttl: Option<Duration>,
    stamp: u64,
}

impl<V> Slot<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(self.inserted) > ttl)
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        let ttl = self.ttl?;
        Some(ttl.saturating_sub(now.saturating_duration_since(self.inserted)))
    }
}

impl<K, V> State<K, V>
where
    K: Hash + Eq + Clone,
{
    fn stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    fn touch(&mut self, key: &K) {
        let stamp = self.stamp();
        if let Some(slot) = self.slots.get_mut(key) {
            self.recency.remove(&slot.stamp);
            slot.stamp = stamp;
            self.recency.insert(stamp, key.clone());
        }
    }

    fn remove(&mut self, key: &K) -> Option<Slot<V>> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.stamp);
        Some(slot)
    }

    /// Drops the entry under `key` if it has expired. Returns `true` if a live entry remains.
    fn retain_live(&mut self, key: &K, now: Instant) -> bool {
        match self.slots.get(key) {
            Some(slot) if slot.is_expired(now) => {
                self.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn evict_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }

        expired.len()
    }

    fn evict_oldest(&mut self) -> Option<(K, V)> {
        let (_, key) = self.recency.pop_first()?;
        let slot = self.slots.remove(&key)?;
        Some((key, slot.value))
    }
}

impl<K, V> LocalCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates a builder for a local cache reading time from `clock`.
    #[must_use]
    pub fn builder(clock: &Clock) -> LocalCacheBuilder<K, V> {
        LocalCacheBuilder::new(clock)
    }

    pub(crate) fn from_builder(builder: LocalCacheBuilder<K, V>) -> Self {
        Self {
            state: Mutex::new(State {
                slots: HashMap::with_capacity(builder.capacity.get()),
                recency: BTreeMap::new(),
                next_stamp: 0,
            }),
            capacity: builder.capacity,
            time_to_live: builder.time_to_live,
            name: builder.name,
            clock: builder.clock,
        }
    }

    /// Returns a clone of the live value under `key` and marks it most recently used.
    ///
    /// An expired entry is removed and reported as absent.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let now = self.clock.instant();
        let mut state = self.state.lock();

        if !state.retain_live(key, now) {
            return None;
        }

        state.touch(key);
        state.slots.get(key).map(|slot| slot.value.clone())
    }

    /// Returns a clone of the live value under `key` without refreshing its recency.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let now = self.clock.instant();
        self.state
            .lock()
            .slots
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.value.clone())
    }

    /// Stores `value` under `key` for `ttl`, making it the most recently used entry.
    ///
    /// Expired entries are swept first. If `key` is new and the cache is still full, the
    /// least-recently accessed entry is evicted and returned. Overwriting an existing key
    /// never evicts.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Option<(K, V)> {
        self.store(key, value, Some(ttl))
    }

    pub(crate) fn store(&self, key: K, value: V, ttl: Option<Duration>) -> Option<(K, V)> {
        let now = self.clock.instant();
        let cached_at = self.clock.system_time();
        let mut state = self.state.lock();

        state.evict_expired(now);

        let previous = state.remove(&key);
        let evicted = if previous.is_none() && state.slots.len() >= self.capacity.get() {
            state.evict_oldest()
        } else {
            None
        };

        let stamp = state.stamp();
        state.recency.insert(stamp, key.clone());
        state.slots.insert(
            key,
            Slot {
                value,
                cached_at,
                inserted: now,
                ttl,
                stamp,
            },
        );

        evicted
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.instant();
        self.state.lock().evict_expired(now)
    }

    /// Returns how long the entry under `key` has left to live.
    ///
    /// Returns `None` if the key is absent, expired, or stored without a TTL.
    #[must_use]
    pub fn remaining_ttl(&self, key: &K) -> Option<Duration> {
        let now = self.clock.instant();
        self.state
            .lock()
            .slots
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .and_then(|slot| slot.remaining(now))
    }

    /// Returns when the live entry under `key` was written and the TTL it was written with.
    #[must_use]
    pub(crate) fn metadata(&self, key: &K) -> Option<(SystemTime, Option<Duration>)> {
        let now = self.clock.instant();
        self.state
            .lock()
            .slots
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| (slot.cached_at, slot.ttl))
    }

    /// Returns what is known about the lifetime of the entry under `key`.
    pub(crate) fn expiry(&self, key: &K) -> Expiry {
        let now = self.clock.instant();
        self.state
            .lock()
            .slots
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map_or(Expiry::Absent, |slot| Expiry::of_present(slot.remaining(now)))
    }

    /// Removes the entry under `key`, returning its value if one was stored.
    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.state.lock().remove(key).map(|slot| slot.value)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.slots.clear();
        state.recency.clear();
    }

    /// Returns `true` if a live entry is stored under `key`, without refreshing its recency.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.instant();
        self.state
            .lock()
            .slots
            .get(key)
            .is_some_and(|slot| !slot.is_expired(now))
    }

    /// Returns the number of stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the keys in eviction order, least recently used first.
    #[cfg(test)]
    pub(crate) fn keys_by_recency(&self) -> Vec<K> {
        self.state.lock().recency.values().cloned().collect()
    }
}

impl<K, V> LocalCache<K, V> {
    /// Returns the maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Returns the TTL applied to tier inserts that carry none.
    #[must_use]
    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live
    }

    /// Returns the configured name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl<K, V> fmt::Debug for LocalCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.state.lock().slots.len())
            .field("time_to_live", &self.time_to_live)
            .finish_non_exhaustive()
    }
}
