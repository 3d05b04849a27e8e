// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use stratum_tier::{CacheEntry, CacheTier, Error, Expiry, Operation};
use tick::Clock;

/// An in-memory shared TTL store.
///
/// Each write records an absolute expiry timestamp taken from the injected [`Clock`]. An
/// entry is gone from the moment its expiry is reached: reads, TTL queries and length
/// reports skip it, and the next read of that key removes it. [`purge_expired`] sweeps the
/// whole store.
///
/// Cloning is cheap and every clone addresses the same store.
///
/// [`purge_expired`]: Self::purge_expired
#[derive(Clone)]
pub struct SharedCache {
    entries: Arc<Mutex<HashMap<String, Stored>>>,
    clock: Clock,
}

struct Stored {
    payload: Vec<u8>,
    cached_at: SystemTime,
    expires_at: Option<SystemTime>,
}

impl Stored {
    fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

impl SharedCache {
    /// Creates an empty store reading time from `clock`.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock: clock.clone(),
        }
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.system_time();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, stored| stored.is_live(now));
        before - entries.len()
    }

    /// Returns the live keys in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.system_time();
        self.entries
            .lock()
            .iter()
            .filter(|(_, stored)| stored.is_live(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns `true` if `other` is a handle onto the same store.
    #[must_use]
    pub fn shares_store_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCache")
            .field("entries", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

impl CacheTier<String, Vec<u8>> for SharedCache {
    async fn get(&self, key: &String) -> Result<Option<CacheEntry<Vec<u8>>>, Error> {
        let now = self.clock.system_time();
        let mut entries = self.entries.lock();

        let Some(stored) = entries.get(key) else {
            return Ok(None);
        };

        if !stored.is_live(now) {
            entries.remove(key);
            return Ok(None);
        }

        let mut entry = CacheEntry::new(stored.payload.clone());
        entry.set_cached_at(stored.cached_at);
        if let Some(ttl) = stored
            .expires_at
            .and_then(|expires_at| expires_at.duration_since(stored.cached_at).ok())
        {
            entry.set_ttl(ttl);
        }

        Ok(Some(entry))
    }

    async fn insert(&self, key: &String, entry: CacheEntry<Vec<u8>>) -> Result<(), Error> {
        let now = self.clock.system_time();
        let expires_at = match entry.ttl() {
            Some(ttl) => Some(
                now.checked_add(ttl)
                    .ok_or_else(|| {
                        Error::during(Operation::Insert, format!("ttl of {ttl:?} overflows the clock")).for_key(key)
                    })?,
            ),
            None => None,
        };

        self.entries.lock().insert(
            key.clone(),
            Stored {
                payload: entry.into_value(),
                cached_at: now,
                expires_at,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &String) -> Result<(), Error> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn remaining_ttl(&self, key: &String) -> Result<Expiry, Error> {
        let now = self.clock.system_time();
        Ok(self
            .entries
            .lock()
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map_or(Expiry::Absent, |stored| {
                Expiry::of_present(
                    stored
                        .expires_at
                        .map(|expires_at| expires_at.duration_since(now).unwrap_or(Duration::ZERO)),
                )
            }))
    }

    fn len(&self) -> Option<u64> {
        let now = self.clock.system_time();
        Some(self.entries.lock().values().filter(|stored| stored.is_live(now)).count() as u64)
    }
}
