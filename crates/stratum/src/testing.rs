// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for the canonical store.
//!
//! [`MockStore`] serves a mutable record set, counts the lookups it receives and can be told
//! to fail or to never answer for chosen keys. It pairs with
//! [`stratum_tier::testing::MockCache`] for the distributed tier.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::{CanonicalStore, Error, ItemKey, ItemValue, Operation};

type KeyPredicate = Box<dyn Fn(&ItemKey) -> bool + Send + Sync>;

/// A canonical store with call recording and fault injection.
///
/// Clones share records, the call log and the configured faults.
///
/// # Examples
///
/// ```
/// use stratum::testing::MockStore;
/// use stratum::{CanonicalStore, ItemKey, ItemValue};
///
/// # futures::executor::block_on(async {
/// let store = MockStore::with_items([ItemValue::new(1u64, "Laptop", 1500)]);
/// store.fail_when(|key| key.as_str() == "2");
///
/// assert!(store.get(&ItemKey::from(1)).await.unwrap().is_some());
/// assert!(store.get(&ItemKey::from(2)).await.is_err());
/// assert_eq!(store.calls(), 2);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    records: Mutex<HashMap<ItemKey, ItemValue>>,
    calls: Mutex<Vec<ItemKey>>,
    fail_when: Mutex<Option<KeyPredicate>>,
    hang_when: Mutex<Option<KeyPredicate>>,
    yields: AtomicUsize,
}

impl MockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `items`.
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = ItemValue>) -> Self {
        let store = Self::new();
        for item in items {
            store.put(item);
        }
        store
    }

    /// Adds or replaces a record.
    pub fn put(&self, item: ItemValue) {
        self.inner.records.lock().insert(item.id.clone(), item);
    }

    /// Deletes a record.
    pub fn remove(&self, key: &ItemKey) -> Option<ItemValue> {
        self.inner.records.lock().remove(key)
    }

    /// Makes lookups of keys matching `predicate` fail. Replaces any earlier predicate.
    pub fn fail_when(&self, predicate: impl Fn(&ItemKey) -> bool + Send + Sync + 'static) {
        *self.inner.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Makes lookups of keys matching `predicate` never complete. Replaces any earlier predicate.
    pub fn hang_when(&self, predicate: impl Fn(&ItemKey) -> bool + Send + Sync + 'static) {
        *self.inner.hang_when.lock() = Some(Box::new(predicate));
    }

    /// Makes every lookup yield to the runtime `times` times before answering.
    ///
    /// This lets concurrent lookups on a single-threaded runtime interleave inside the store.
    pub fn yield_before_answer(&self, times: usize) {
        self.inner.yields.store(times, Ordering::Relaxed);
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        *self.inner.fail_when.lock() = None;
        *self.inner.hang_when.lock() = None;
    }

    /// Returns the total number of lookups received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.calls.lock().len()
    }

    /// Returns the number of lookups received for `key`.
    #[must_use]
    pub fn calls_for(&self, key: &ItemKey) -> usize {
        self.inner.calls.lock().iter().filter(|k| *k == key).count()
    }

    /// Forgets all recorded lookups.
    pub fn reset_calls(&self) {
        self.inner.calls.lock().clear();
    }

    fn should_fail(&self, key: &ItemKey) -> bool {
        self.inner.fail_when.lock().as_ref().is_some_and(|predicate| predicate(key))
    }

    fn should_hang(&self, key: &ItemKey) -> bool {
        self.inner.hang_when.lock().as_ref().is_some_and(|predicate| predicate(key))
    }
}

impl fmt::Debug for MockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockStore")
            .field("records", &self.inner.records.lock().len())
            .field("calls", &self.calls())
            .field("fail_when", &self.inner.fail_when.lock().is_some())
            .field("hang_when", &self.inner.hang_when.lock().is_some())
            .finish()
    }
}

impl CanonicalStore for MockStore {
    async fn get(&self, key: &ItemKey) -> Result<Option<ItemValue>, Error> {
        self.inner.calls.lock().push(key.clone());

        for _ in 0..self.inner.yields.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }

        if self.should_hang(key) {
            std::future::pending::<()>().await;
        }

        if self.should_fail(key) {
            return Err(Error::during(Operation::Get, format!("mock store: lookup of {key} failed")).for_key(key));
        }

        Ok(self.inner.records.lock().get(key).cloned())
    }
}
