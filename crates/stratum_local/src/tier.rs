// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! [`CacheTier`] implementation for [`LocalCache`].

use std::hash::Hash;

use stratum_tier::{CacheEntry, CacheTier, Error, Expiry};

use crate::LocalCache;

impl<K, V> CacheTier<K, V> for LocalCache<K, V>
where
    K: Clone + Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        let Some(value) = Self::get(self, key) else {
            return Ok(None);
        };

        let entry = match self.metadata(key) {
            Some((cached_at, Some(ttl))) => CacheEntry::expires_at(value, ttl, cached_at),
            Some((cached_at, None)) => {
                let mut entry = CacheEntry::new(value);
                entry.set_cached_at(cached_at);
                entry
            }
            None => CacheEntry::new(value),
        };

        Ok(Some(entry))
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        let ttl = entry.ttl().or_else(|| self.time_to_live());
        self.store(key.clone(), entry.into_value(), ttl);
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        Self::invalidate(self, key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        Self::clear(self);
        Ok(())
    }

    async fn remaining_ttl(&self, key: &K) -> Result<Expiry, Error> {
        Ok(self.expiry(key))
    }

    fn len(&self) -> Option<u64> {
        Some(Self::len(self) as u64)
    }
}
