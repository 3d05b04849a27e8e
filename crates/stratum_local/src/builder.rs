// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring local caches.

use std::hash::Hash;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::time::Duration;

use tick::Clock;

use crate::cache::LocalCache;

/// Capacity used when none is configured.
const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(4);

/// Builder for configuring a [`LocalCache`].
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use std::time::Duration;
///
/// use stratum_local::LocalCache;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let cache = LocalCache::<String, i32>::builder(&clock)
///     .capacity(NonZeroUsize::new(100).unwrap())
///     .time_to_live(Duration::from_secs(60))
///     .name("products")
///     .build();
///
/// assert_eq!(cache.capacity().get(), 100);
/// ```
#[derive(Debug)]
pub struct LocalCacheBuilder<K, V> {
    pub(crate) clock: Clock,
    pub(crate) capacity: NonZeroUsize,
    pub(crate) time_to_live: Option<Duration>,
    pub(crate) name: Option<String>,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> LocalCacheBuilder<K, V> {
    pub(crate) fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            capacity: DEFAULT_CAPACITY,
            time_to_live: None,
            name: None,
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries.
    ///
    /// Inserting a new key into a full cache evicts the least-recently accessed entry.
    /// Defaults to 5.
    #[must_use]
    pub fn capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the TTL applied to entries written through [`CacheTier::insert`] without one.
    ///
    /// Entries written with [`LocalCache::set`] always carry their own TTL.
    ///
    /// [`CacheTier::insert`]: stratum_tier::CacheTier::insert
    #[must_use]
    pub fn time_to_live(mut self, duration: Duration) -> Self {
        self.time_to_live = Some(duration);
        self
    }

    /// Sets a name for the cache, reported by [`LocalCache::name`] and in debug output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured [`LocalCache`].
    #[must_use]
    pub fn build(self) -> LocalCache<K, V>
    where
        K: Hash + Eq + Clone,
    {
        LocalCache::from_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_five() {
        assert_eq!(DEFAULT_CAPACITY.get(), 5);

        let builder = LocalCacheBuilder::<String, i32>::new(&Clock::new_frozen());
        assert_eq!(builder.capacity, DEFAULT_CAPACITY);
        assert!(builder.time_to_live.is_none());
        assert!(builder.name.is_none());
    }
}
