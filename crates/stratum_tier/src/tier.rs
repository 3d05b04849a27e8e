// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache tiers.
//!
//! [`CacheTier`] defines the interface every tier of the lookup chain implements,
//! whether it lives in-process or behind a network connection.

use crate::{CacheEntry, Error, Expiry};

/// Trait for cache tier implementations.
///
/// The four storage methods are required: `get`, `insert`, `invalidate`, and `clear`.
/// The rest have default implementations:
/// - `remaining_ttl`: Returns [`Expiry::Unknown`] (the tier does not report expiry)
/// - `len`: Returns `None` (not all tiers track size)
/// - `is_empty`: Delegates to `len`
///
/// A tier that expires entries must make `get` on an expired key indistinguishable from
/// `get` on a key that was never inserted.
pub trait CacheTier<K, V>: Send + Sync {
    /// Gets a value, returning an error if the operation fails.
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<CacheEntry<V>>, Error>> + Send;

    /// Inserts a value, returning an error if the operation fails.
    ///
    /// A TTL carried by the entry takes precedence over any tier-level TTL.
    fn insert(&self, key: &K, entry: CacheEntry<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Invalidates a value, returning an error if the operation fails.
    fn invalidate(&self, key: &K) -> impl Future<Output = Result<(), Error>> + Send;

    /// Clears all entries, returning an error if the operation fails.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns how long the entry for `key` has left to live.
    ///
    /// Tiers that do not track expiry keep the default, [`Expiry::Unknown`].
    fn remaining_ttl(&self, key: &K) -> impl Future<Output = Result<Expiry, Error>> + Send {
        let _ = key;
        std::future::ready(Ok(Expiry::Unknown))
    }

    /// Returns the number of entries, if supported.
    ///
    /// Returns `None` for implementations that don't track size.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the cache contains no entries.
    ///
    /// Returns `None` for implementations that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}
