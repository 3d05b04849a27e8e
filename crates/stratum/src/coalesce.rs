// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Coalesces concurrent fetches of the same key into a single execution.
//!
//! The first caller for a key becomes the leader and runs the work while holding the
//! flight's slot lock. Callers arriving in the meantime become followers: they queue on the
//! lock and receive a clone of the leader's result. If the leader is dropped before storing
//! a result, the first follower to acquire the lock finds the slot empty and runs its own
//! work in the leader's place. A key stays published while any caller is attached to its
//! flight, and is dropped with the last one.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

type Flight<T> = AsyncMutex<Option<T>>;
type Mapping<K, T> = Arc<Mutex<HashMap<K, Entry<T>>>>;

/// A flight and the number of callers still attached to it.
struct Entry<T> {
    flight: Arc<Flight<T>>,
    callers: usize,
}

/// How a caller took part in a coalesced fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    /// The caller ran the work.
    Leader,
    /// The caller received another caller's result.
    Follower,
}

/// Deduplicates concurrent work per key.
pub(crate) struct Coalescer<K, T> {
    mapping: Mapping<K, T>,
}

impl<K, T> Default for Coalescer<K, T> {
    fn default() -> Self {
        Self {
            mapping: Arc::default(),
        }
    }
}

impl<K, T> fmt::Debug for Coalescer<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.mapping.lock().len())
            .finish()
    }
}

impl<K, T> Coalescer<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `func` for `key` unless a fetch of `key` is already in flight, in which case
    /// the in-flight result is shared.
    ///
    /// The caller is attached to the flight as soon as this returns. Dropping the returned
    /// future, polled or not, detaches it again.
    pub(crate) fn work<F, Fut>(&self, key: K, func: F) -> impl Future<Output = (T, Role)> + use<K, T, F, Fut>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (flight, claim) = {
            let mut map = self.mapping.lock();
            match map.get_mut(&key) {
                Some(entry) => {
                    entry.callers += 1;
                    (Arc::clone(&entry.flight), None)
                }
                None => {
                    let flight: Arc<Flight<T>> = Arc::new(AsyncMutex::new(None));
                    // A fresh lock is uncontended; claiming it before publishing the flight
                    // guarantees followers queue behind the leader.
                    let claim = Arc::clone(&flight).try_lock_owned().ok();
                    map.insert(
                        key.clone(),
                        Entry {
                            flight: Arc::clone(&flight),
                            callers: 1,
                        },
                    );
                    (flight, claim)
                }
            }
        };
        let attached = Attached {
            mapping: Arc::clone(&self.mapping),
            key,
            flight,
        };

        async move {
            let mut slot = match claim {
                Some(guard) => guard,
                None => {
                    let guard = Arc::clone(&attached.flight).lock_owned().await;
                    if let Some(value) = guard.as_ref() {
                        return (value.clone(), Role::Follower);
                    }
                    // The leader went away without a result.
                    guard
                }
            };

            let value = func().await;
            *slot = Some(value.clone());
            drop(slot);
            attached.land();
            (value, Role::Leader)
        }
    }

    /// Returns the number of keys with a fetch in flight.
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.mapping.lock().len()
    }
}

/// Keeps one caller counted against its flight until the caller finishes or is dropped.
struct Attached<K, T>
where
    K: Hash + Eq,
{
    mapping: Mapping<K, T>,
    key: K,
    flight: Arc<Flight<T>>,
}

impl<K, T> Attached<K, T>
where
    K: Hash + Eq,
{
    fn is_current(&self, entry: &Entry<T>) -> bool {
        Arc::ptr_eq(&entry.flight, &self.flight)
    }

    /// Unpublishes a flight that has its result, so later callers start a fresh one.
    fn land(&self) {
        let mut map = self.mapping.lock();
        if map.get(&self.key).is_some_and(|entry| self.is_current(entry)) {
            map.remove(&self.key);
        }
    }
}

impl<K, T> Drop for Attached<K, T>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        let mut map = self.mapping.lock();
        let Some(entry) = map.get_mut(&self.key).filter(|entry| self.is_current(entry)) else {
            return;
        };
        entry.callers = entry.callers.saturating_sub(1);
        if entry.callers == 0 {
            map.remove(&self.key);
        }
    }
}
