// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The authoritative record source behind the cache tiers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{Error, ItemKey, ItemValue};

/// Keyed, read-only access to the authoritative record set.
///
/// Implementations perform no caching and have no side effects visible to the cache.
/// `Ok(None)` means the record does not exist; `Err` means the store could not answer.
pub trait CanonicalStore: Send + Sync {
    /// Fetches the record named by `key`.
    fn get(&self, key: &ItemKey) -> impl Future<Output = Result<Option<ItemValue>, Error>> + Send;
}

impl<S> CanonicalStore for Arc<S>
where
    S: CanonicalStore,
{
    fn get(&self, key: &ItemKey) -> impl Future<Output = Result<Option<ItemValue>, Error>> + Send {
        S::get(self, key)
    }
}

/// A canonical store over a fixed in-memory record set.
///
/// # Examples
///
/// ```
/// use stratum::{CanonicalStore, InMemoryStore, ItemKey};
///
/// # futures::executor::block_on(async {
/// let store = InMemoryStore::catalogue();
/// let laptop = store.get(&ItemKey::from(1)).await?.expect("laptop exists");
/// assert_eq!(laptop.name, "Laptop");
/// assert!(store.get(&ItemKey::from(99)).await?.is_none());
/// # Ok::<(), stratum::Error>(())
/// # }).unwrap();
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    records: HashMap<ItemKey, ItemValue>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the five-product catalogue used by the demo.
    #[must_use]
    pub fn catalogue() -> Self {
        Self::from_iter([
            ItemValue::new(1u64, "Laptop", 1500),
            ItemValue::new(2u64, "Phone", 800),
            ItemValue::new(3u64, "Headphones", 150),
            ItemValue::new(4u64, "Monitor", 300),
            ItemValue::new(5u64, "Keyboard", 50),
        ])
    }

    /// Adds or replaces a record, keyed by its identifier.
    pub fn insert(&mut self, value: ItemValue) -> Option<ItemValue> {
        self.records.insert(value.id.clone(), value)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ItemValue> for InMemoryStore {
    fn from_iter<T: IntoIterator<Item = ItemValue>>(iter: T) -> Self {
        let mut store = Self::new();
        for value in iter {
            store.insert(value);
        }
        store
    }
}

impl CanonicalStore for InMemoryStore {
    async fn get(&self, key: &ItemKey) -> Result<Option<ItemValue>, Error> {
        Ok(self.records.get(key).cloned())
    }
}
