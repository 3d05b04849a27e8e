// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A recording tier for tests.
//!
//! [`MockCache`] stores entries in memory, records every operation it sees and can be told
//! to fail chosen operations, which makes it a convenient stand-in for an unreachable
//! distributed tier.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::Mutex;

use crate::{CacheEntry, CacheTier, Error, Expiry, Operation};

/// An operation observed by a [`MockCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp<K, V> {
    /// A lookup of the given key.
    Get(K),
    /// A write of `entry` under `key`.
    Insert {
        /// The key that was written.
        key: K,
        /// The entry that was written.
        entry: CacheEntry<V>,
    },
    /// A removal of the given key.
    Invalidate(K),
    /// A removal of every entry.
    Clear,
    /// A query of the remaining lifetime of the given key.
    RemainingTtl(K),
}

impl<K, V> CacheOp<K, V> {
    /// Returns the key the operation targets, if any.
    #[must_use]
    pub fn key(&self) -> Option<&K> {
        match self {
            Self::Get(key) | Self::Invalidate(key) | Self::RemainingTtl(key) => Some(key),
            Self::Insert { key, .. } => Some(key),
            Self::Clear => None,
        }
    }

    /// Returns the tier operation this corresponds to.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Get(_) => Operation::Get,
            Self::Insert { .. } => Operation::Insert,
            Self::Invalidate(_) => Operation::Invalidate,
            Self::Clear => Operation::Clear,
            Self::RemainingTtl(_) => Operation::RemainingTtl,
        }
    }
}

type FailPredicate<K, V> = Box<dyn Fn(&CacheOp<K, V>) -> bool + Send + Sync>;

/// An in-memory tier that records operations and injects failures.
///
/// Clones share storage, the operation log and the failure predicate, so a test can keep
/// one handle for assertions while the code under test owns another.
///
/// Entries never expire on their own. [`CacheTier::remaining_ttl`] reports the TTL the entry
/// was written with, [`Expiry::Never`] for an entry without one, and [`Expiry::Absent`] for a
/// missing key.
///
/// # Examples
///
/// ```
/// use stratum_tier::{testing::{MockCache, CacheOp}, CacheTier, CacheEntry};
///
/// # futures::executor::block_on(async {
/// let cache = MockCache::<String, i32>::new();
/// cache.fail_when(|op| matches!(op, CacheOp::Get(k) if k == "forbidden"));
///
/// assert!(cache.get(&"forbidden".to_string()).await.is_err());
/// assert!(cache.get(&"allowed".to_string()).await.unwrap().is_none());
/// assert_eq!(cache.operations().len(), 2);
/// # });
/// ```
pub struct MockCache<K, V> {
    data: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
    operations: Arc<Mutex<Vec<CacheOp<K, V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<K, V>>>>,
}

impl<K, V> std::fmt::Debug for MockCache<K, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCache")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<K, V> Clone for MockCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<K, V> Default for MockCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MockCache<K, V> {
    /// Creates an empty mock tier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes operations matching `predicate` fail with an error.
    ///
    /// Failed operations are still recorded. Replaces any earlier predicate.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&CacheOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Removes the failure predicate.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Forgets all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn should_fail(&self, op: &CacheOp<K, V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }

    fn check(&self, op: CacheOp<K, V>) -> Result<(), Error> {
        let failed = self.should_fail(&op);
        let operation = op.operation();
        self.operations.lock().push(op);
        if failed {
            return Err(Error::during(operation, format!("mock: {operation} failed")));
        }
        Ok(())
    }
}

impl<K, V> MockCache<K, V>
where
    K: Eq + Hash,
{
    /// Creates a mock tier holding `data`.
    #[must_use]
    pub fn with_data(data: HashMap<K, CacheEntry<V>>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Writes an entry without recording an operation.
    pub fn seed(&self, key: K, entry: CacheEntry<V>) {
        self.data.lock().insert(key, entry);
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns `true` if an entry is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.lock().contains_key(key)
    }
}

impl<K, V> MockCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns the entry stored under `key` without recording an operation.
    #[must_use]
    pub fn stored(&self, key: &K) -> Option<CacheEntry<V>> {
        self.data.lock().get(key).cloned()
    }
}

impl<K, V> MockCache<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Returns every operation recorded so far, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<CacheOp<K, V>> {
        self.operations.lock().clone()
    }

    /// Returns how many recorded operations satisfy `predicate`.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&CacheOp<K, V>) -> bool) -> usize {
        self.operations.lock().iter().filter(|op| predicate(op)).count()
    }
}

impl<K, V> CacheTier<K, V> for MockCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.check(CacheOp::Get(key.clone()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.check(
            CacheOp::Insert {
                key: key.clone(),
                entry: entry.clone(),
            },
        )?;
        self.data.lock().insert(key.clone(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.check(CacheOp::Invalidate(key.clone()))?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.check(CacheOp::Clear)?;
        self.data.lock().clear();
        Ok(())
    }

    async fn remaining_ttl(&self, key: &K) -> Result<Expiry, Error> {
        self.check(CacheOp::RemainingTtl(key.clone()))?;
        Ok(self
            .data
            .lock()
            .get(key)
            .map_or(Expiry::Absent, |entry| Expiry::of_present(entry.ttl())))
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.lock().len() as u64)
    }
}
