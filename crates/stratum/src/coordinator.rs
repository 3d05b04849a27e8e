// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The read-through coordinator over the local, distributed and canonical tiers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use stratum_local::LocalCache;
use stratum_tier::{CacheEntry, CacheTier, Expiry, Operation};
use tick::{Clock, FutureExt as _};

use crate::coalesce::{Coalescer, Role};
use crate::config::{CoordinatorConfig, Settings};
use crate::telemetry::{Activity, LookupTelemetry, Tier};
use crate::{CanonicalStore, ConfigError, Error, ItemKey, ItemValue, LookupError, codec};

/// Serves item lookups from the fastest tier that holds them.
///
/// A lookup consults the local tier, then the distributed tier under the key
/// `<key_prefix><key>`, then the canonical store. Every deeper hit is written back into the
/// faster tiers: a canonical hit lands in the distributed tier for `distributed_ttl_secs` and
/// in the local tier for `local_ttl_secs`; a distributed hit lands in the local tier for no
/// longer than the distributed entry has left to live.
///
/// The distributed tier fails open: errors, timeouts and undecodable payloads count as a miss
/// and the lookup continues to the canonical store. Canonical failures are returned to the
/// caller. Records the canonical store does not know are reported as
/// [`LookupError::NotFound`] and never cached.
///
/// # Examples
///
/// ```
/// use stratum::{CacheCoordinator, InMemoryStore, ItemKey, SharedCache};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let clock = Clock::new_frozen();
/// let coordinator = CacheCoordinator::builder(&clock)
///     .distributed(SharedCache::new(&clock))
///     .store(InMemoryStore::catalogue())
///     .build()?;
///
/// let laptop = coordinator.get(&ItemKey::from(1)).await?;
/// assert_eq!(laptop.name, "Laptop");
/// assert!(coordinator.local_contains(&ItemKey::from(1)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # }).unwrap();
/// ```
pub struct CacheCoordinator<D, S> {
    config: CoordinatorConfig,
    settings: Settings,
    local: LocalCache<ItemKey, ItemValue>,
    distributed: D,
    store: S,
    clock: Clock,
    telemetry: LookupTelemetry,
    flights: Coalescer<ItemKey, Result<ItemValue, LookupError>>,
}

impl<D, S> fmt::Debug for CacheCoordinator<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("config", &self.config)
            .field("local", &self.local)
            .field("telemetry", &self.telemetry)
            .field("flights", &self.flights)
            .finish_non_exhaustive()
    }
}

impl CacheCoordinator<(), ()> {
    /// Starts building a coordinator that reads time from `clock`.
    #[must_use]
    pub fn builder(clock: &Clock) -> CoordinatorBuilder {
        CoordinatorBuilder::new(clock)
    }
}

impl<D, S> CacheCoordinator<D, S>
where
    D: CacheTier<String, Vec<u8>>,
    S: CanonicalStore,
{
    /// Looks up `key`, reading through the tiers.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] if the canonical store has no record,
    /// [`LookupError::Canonical`] if it failed, and [`LookupError::CanonicalTimeout`] if it did
    /// not answer in time. Distributed-tier faults never fail a lookup.
    pub async fn get(&self, key: &ItemKey) -> Result<ItemValue, LookupError> {
        let stopwatch = self.clock.stopwatch();
        if let Some(value) = self.local.get(key) {
            self.telemetry
                .record(Tier::Local, Activity::Hit, key, Some(stopwatch.elapsed()));
            return Ok(value);
        }
        self.telemetry
            .record(Tier::Local, Activity::Miss, key, Some(stopwatch.elapsed()));

        let distributed_key = self.distributed_key(key);
        if let Some(entry) = self.get_distributed(key, &distributed_key).await {
            let value = entry.value().clone();
            self.promote(key, &distributed_key, entry).await;
            return Ok(value);
        }

        if !self.settings.stampede_protection {
            return self.load(key, &distributed_key).await;
        }

        let (result, role) = self
            .flights
            .work(key.clone(), || self.load(key, &distributed_key))
            .await;
        if role == Role::Follower {
            self.telemetry.record(Tier::Canonical, Activity::Coalesced, key, None);
        }
        result
    }

    /// Removes `key` from the local and the distributed tier.
    ///
    /// The local entry is removed first, so a distributed failure leaves at most a
    /// distributed entry behind that expires on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the distributed tier failed or did not answer in time.
    pub async fn invalidate(&self, key: &ItemKey) -> Result<(), Error> {
        if self.local.invalidate(key).is_some() {
            self.telemetry.record(Tier::Local, Activity::Invalidated, key, None);
        }

        let distributed_key = self.distributed_key(key);
        let stopwatch = self.clock.stopwatch();
        match self
            .bounded(self.distributed.invalidate(&distributed_key), self.settings.distributed_timeout)
            .await
        {
            Some(Ok(())) => {
                self.telemetry.record(
                    Tier::Distributed,
                    Activity::Invalidated,
                    key,
                    Some(stopwatch.elapsed()),
                );
                Ok(())
            }
            Some(Err(error)) => {
                self.telemetry.record_error(
                    Tier::Distributed,
                    Activity::Error,
                    key,
                    Some(stopwatch.elapsed()),
                    &error,
                );
                Err(error)
            }
            None => {
                self.telemetry
                    .record(Tier::Distributed, Activity::TimedOut, key, Some(stopwatch.elapsed()));
                Err(Error::during(Operation::Invalidate, "did not complete in time").for_key(distributed_key))
            }
        }
    }

    /// Reads `key` from the distributed tier, absorbing every fault as a miss.
    async fn get_distributed(&self, key: &ItemKey, distributed_key: &String) -> Option<CacheEntry<ItemValue>> {
        let stopwatch = self.clock.stopwatch();
        let fetched = self
            .bounded(self.distributed.get(distributed_key), self.settings.distributed_timeout)
            .await;
        let elapsed = Some(stopwatch.elapsed());

        let entry = match fetched {
            Some(Ok(Some(entry))) => entry,
            Some(Ok(None)) => {
                self.telemetry.record(Tier::Distributed, Activity::Miss, key, elapsed);
                return None;
            }
            Some(Err(error)) => {
                self.telemetry
                    .record_error(Tier::Distributed, Activity::Error, key, elapsed, &error);
                return None;
            }
            None => {
                self.telemetry.record(Tier::Distributed, Activity::TimedOut, key, elapsed);
                return None;
            }
        };

        match codec::decode(entry.value()) {
            Ok(value) if value.id == *key => {
                self.telemetry.record(Tier::Distributed, Activity::Hit, key, elapsed);
                let mut decoded = CacheEntry::new(value);
                if let Some(cached_at) = entry.cached_at() {
                    decoded.set_cached_at(cached_at);
                }
                if let Some(ttl) = entry.ttl() {
                    decoded.set_ttl(ttl);
                }
                Some(decoded)
            }
            Ok(value) => {
                self.telemetry.record_error(
                    Tier::Distributed,
                    Activity::Malformed,
                    key,
                    elapsed,
                    &format!("payload carries item {}", value.id),
                );
                None
            }
            Err(error) => {
                self.telemetry
                    .record_error(Tier::Distributed, Activity::Malformed, key, elapsed, &error);
                None
            }
        }
    }

    /// Copies a distributed hit into the local tier, never past the distributed expiry.
    ///
    /// Nothing is copied when the distributed entry has vanished since it was read, or when
    /// neither the tier nor the entry tells how long it has left.
    async fn promote(&self, key: &ItemKey, distributed_key: &String, entry: CacheEntry<ItemValue>) {
        let reported = match self
            .bounded(self.distributed.remaining_ttl(distributed_key), self.settings.distributed_timeout)
            .await
        {
            Some(Ok(expiry)) => expiry,
            Some(Err(error)) => {
                self.telemetry
                    .record_error(Tier::Distributed, Activity::Error, key, None, &error);
                Expiry::Unknown
            }
            None => {
                self.telemetry.record(Tier::Distributed, Activity::TimedOut, key, None);
                Expiry::Unknown
            }
        };

        let expiry = match reported {
            Expiry::Unknown => entry
                .remaining_at(self.clock.system_time())
                .map_or(Expiry::Unknown, Expiry::In),
            known => known,
        };
        let Some(ttl) = expiry.bound(self.settings.local_ttl) else {
            return;
        };

        self.store_local(key, entry.into_value(), ttl);
    }

    /// Fetches `key` from the canonical store and backfills both tiers on success.
    async fn load(&self, key: &ItemKey, distributed_key: &String) -> Result<ItemValue, LookupError> {
        let stopwatch = self.clock.stopwatch();
        let fetched = match self.settings.canonical_timeout {
            Some(timeout) => self
                .store
                .get(key)
                .timeout(&self.clock, timeout)
                .await
                .map_err(|_elapsed| LookupError::CanonicalTimeout {
                    key: key.clone(),
                    timeout,
                }),
            None => Ok(self.store.get(key).await),
        };
        let elapsed = Some(stopwatch.elapsed());

        let value = match fetched {
            Ok(Ok(Some(value))) => value,
            Ok(Ok(None)) => {
                self.telemetry.record(Tier::Canonical, Activity::NotFound, key, elapsed);
                return Err(LookupError::NotFound { key: key.clone() });
            }
            Ok(Err(source)) => {
                self.telemetry
                    .record_error(Tier::Canonical, Activity::Error, key, elapsed, &source);
                return Err(LookupError::Canonical {
                    key: key.clone(),
                    source: Arc::new(source),
                });
            }
            Err(timed_out) => {
                self.telemetry.record(Tier::Canonical, Activity::TimedOut, key, elapsed);
                return Err(timed_out);
            }
        };
        self.telemetry.record(Tier::Canonical, Activity::Hit, key, elapsed);

        self.backfill_distributed(key, distributed_key, &value).await;
        self.store_local(key, value.clone(), self.settings.local_ttl);
        Ok(value)
    }

    async fn backfill_distributed(&self, key: &ItemKey, distributed_key: &String, value: &ItemValue) {
        let payload = match codec::encode(value) {
            Ok(payload) => payload,
            Err(error) => {
                self.telemetry
                    .record_error(Tier::Distributed, Activity::BackfillFailed, key, None, &error);
                return;
            }
        };

        let stopwatch = self.clock.stopwatch();
        let entry = CacheEntry::with_ttl(payload, self.settings.distributed_ttl);
        let written = self
            .bounded(self.distributed.insert(distributed_key, entry), self.settings.distributed_timeout)
            .await;
        let elapsed = Some(stopwatch.elapsed());

        match written {
            Some(Ok(())) => self.telemetry.record(Tier::Distributed, Activity::Backfill, key, elapsed),
            Some(Err(error)) => {
                self.telemetry
                    .record_error(Tier::Distributed, Activity::BackfillFailed, key, elapsed, &error);
            }
            None => self.telemetry.record(Tier::Distributed, Activity::TimedOut, key, elapsed),
        }
    }
}

impl<D, S> CacheCoordinator<D, S> {
    /// Returns the configuration the coordinator was built from.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the number of entries held by the local tier, expired ones included until
    /// they are swept.
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    /// Returns `true` if the local tier holds a live entry for `key`.
    #[must_use]
    pub fn local_contains(&self, key: &ItemKey) -> bool {
        self.local.contains_key(key)
    }

    /// Returns how long the local entry for `key` has left to live.
    #[must_use]
    pub fn local_remaining_ttl(&self, key: &ItemKey) -> Option<Duration> {
        self.local.remaining_ttl(key)
    }

    /// Consumes the coordinator and returns the distributed tier and the canonical store.
    ///
    /// The local tier is dropped.
    #[must_use]
    pub fn into_parts(self) -> (D, S) {
        (self.distributed, self.store)
    }

    fn distributed_key(&self, key: &ItemKey) -> String {
        format!("{}{key}", self.settings.key_prefix)
    }

    fn store_local(&self, key: &ItemKey, value: ItemValue, ttl: Duration) {
        if let Some((evicted, _)) = self.local.set(key.clone(), value, ttl) {
            self.telemetry.record(Tier::Local, Activity::Evicted, &evicted, None);
        }
        self.telemetry.record(Tier::Local, Activity::Backfill, key, None);
        self.telemetry.record_local_size(self.local.len());
    }

    /// Awaits `future`, giving up after `limit` if one is set.
    async fn bounded<F: Future>(&self, future: F, limit: Option<Duration>) -> Option<F::Output> {
        match limit {
            Some(limit) => future.timeout(&self.clock, limit).await.ok(),
            None => Some(future.await),
        }
    }
}

/// Builder for a [`CacheCoordinator`].
///
/// The distributed tier and the canonical store are required; `build` is only available
/// once both have been provided.
///
/// # Examples
///
/// ```
/// use stratum::{CacheCoordinator, CoordinatorConfig, InMemoryStore, LookupTelemetry, SharedCache};
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let coordinator = CacheCoordinator::builder(&clock)
///     .config(CoordinatorConfig {
///         local_capacity: 100,
///         ..CoordinatorConfig::default()
///     })
///     .telemetry(LookupTelemetry::new().with_logs(false))
///     .distributed(SharedCache::new(&clock))
///     .store(InMemoryStore::catalogue())
///     .build()?;
///
/// assert_eq!(coordinator.config().local_capacity, 100);
/// # Ok::<(), stratum::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct CoordinatorBuilder<D = (), S = ()> {
    clock: Clock,
    config: CoordinatorConfig,
    telemetry: LookupTelemetry,
    distributed: D,
    store: S,
}

impl CoordinatorBuilder {
    fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            config: CoordinatorConfig::default(),
            telemetry: LookupTelemetry::default(),
            distributed: (),
            store: (),
        }
    }
}

impl<D, S> CoordinatorBuilder<D, S> {
    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the telemetry sink.
    #[must_use]
    pub fn telemetry(mut self, telemetry: LookupTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Sets the distributed tier.
    #[must_use]
    pub fn distributed<D2>(self, distributed: D2) -> CoordinatorBuilder<D2, S>
    where
        D2: CacheTier<String, Vec<u8>>,
    {
        CoordinatorBuilder {
            clock: self.clock,
            config: self.config,
            telemetry: self.telemetry,
            distributed,
            store: self.store,
        }
    }

    /// Sets the canonical store.
    #[must_use]
    pub fn store<S2>(self, store: S2) -> CoordinatorBuilder<D, S2>
    where
        S2: CanonicalStore,
    {
        CoordinatorBuilder {
            clock: self.clock,
            config: self.config,
            telemetry: self.telemetry,
            distributed: self.distributed,
            store,
        }
    }
}

impl<D, S> CoordinatorBuilder<D, S>
where
    D: CacheTier<String, Vec<u8>>,
    S: CanonicalStore,
{
    /// Validates the configuration and builds the coordinator.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration cannot be served.
    pub fn build(self) -> Result<CacheCoordinator<D, S>, ConfigError> {
        let settings = self.config.validate()?;
        let local = LocalCache::builder(&self.clock)
            .capacity(settings.local_capacity)
            .time_to_live(settings.local_ttl)
            .name("stratum.local")
            .build();

        Ok(CacheCoordinator {
            config: self.config,
            settings,
            local,
            distributed: self.distributed,
            store: self.store,
            clock: self.clock,
            telemetry: self.telemetry,
            flights: Coalescer::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt as _;
    use futures::executor::block_on;
    use stratum_distributed::SharedCache;
    use stratum_tier::testing::{CacheOp, MockCache};
    use tick::ClockControl;

    use super::*;
    use crate::InMemoryStore;
    use crate::telemetry::testing::LogCapture;
    use crate::testing::MockStore;

    fn quiet() -> LookupTelemetry {
        LookupTelemetry::new().with_logs(false)
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(CacheCoordinator<SharedCache, InMemoryStore>: Send, Sync, fmt::Debug);
    }

    #[test]
    fn distributed_key_uses_prefix() {
        let clock = ClockControl::new().to_clock();
        let coordinator = CacheCoordinator::builder(&clock)
            .config(CoordinatorConfig {
                key_prefix: "product_".to_owned(),
                ..CoordinatorConfig::default()
            })
            .distributed(SharedCache::new(&clock))
            .store(InMemoryStore::new())
            .build()
            .unwrap();

        assert_eq!(coordinator.distributed_key(&ItemKey::from(42)), "product_42");
    }

    #[test]
    fn build_rejects_invalid_config() {
        let clock = ClockControl::new().to_clock();
        let err = CacheCoordinator::builder(&clock)
            .config(CoordinatorConfig {
                local_capacity: 0,
                ..CoordinatorConfig::default()
            })
            .distributed(SharedCache::new(&clock))
            .store(InMemoryStore::new())
            .build()
            .unwrap_err();

        assert_eq!(err, ConfigError::ZeroCapacity);
    }

    #[test]
    fn canonical_hit_writes_both_tiers_with_their_ttls() {
        let clock = ClockControl::new().to_clock();
        let distributed = MockCache::<String, Vec<u8>>::new();
        let coordinator = CacheCoordinator::builder(&clock)
            .telemetry(quiet())
            .distributed(distributed.clone())
            .store(InMemoryStore::catalogue())
            .build()
            .unwrap();

        let key = ItemKey::from(2);
        let phone = block_on(coordinator.get(&key)).unwrap();
        assert_eq!(phone.name, "Phone");

        let stored = distributed.stored(&"item_2".to_owned()).unwrap();
        assert_eq!(stored.ttl(), Some(Duration::from_secs(300)));
        assert_eq!(codec::decode(stored.value()).unwrap(), phone);
        assert_eq!(coordinator.local_remaining_ttl(&key), Some(Duration::from_secs(60)));
    }

    #[test]
    fn local_hit_skips_distributed_tier() {
        let clock = ClockControl::new().to_clock();
        let distributed = MockCache::<String, Vec<u8>>::new();
        let coordinator = CacheCoordinator::builder(&clock)
            .telemetry(quiet())
            .distributed(distributed.clone())
            .store(InMemoryStore::catalogue())
            .build()
            .unwrap();

        let key = ItemKey::from(1);
        block_on(coordinator.get(&key)).unwrap();
        distributed.clear_operations();

        block_on(coordinator.get(&key)).unwrap();
        assert!(distributed.operations().is_empty());
    }

    #[test]
    fn promotion_is_clamped_to_distributed_remaining_ttl() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let distributed = MockCache::<String, Vec<u8>>::new();
        let laptop = ItemValue::new(1u64, "Laptop", 1500);
        distributed.seed(
            "item_1".to_owned(),
            CacheEntry::expires_at(codec::encode(&laptop).unwrap(), Duration::from_secs(20), clock.system_time()),
        );
        let coordinator = CacheCoordinator::builder(&clock)
            .telemetry(quiet())
            .distributed(distributed.clone())
            .store(InMemoryStore::new())
            .build()
            .unwrap();

        let key = ItemKey::from(1);
        assert_eq!(block_on(coordinator.get(&key)).unwrap(), laptop);

        assert_eq!(coordinator.local_remaining_ttl(&key), Some(Duration::from_secs(20)));
        assert_eq!(
            distributed.count(|op| matches!(op, CacheOp::RemainingTtl(_))),
            1
        );
    }

    #[test]
    fn abandoned_lookups_do_not_pin_flights() {
        let clock = ClockControl::new().to_clock();
        let store = MockStore::with_items([ItemValue::new(1u64, "Laptop", 1500)]);
        store.hang_when(|_| true);
        let coordinator = CacheCoordinator::builder(&clock)
            .telemetry(quiet())
            .distributed(SharedCache::new(&clock))
            .store(store.clone())
            .build()
            .unwrap();

        for id in 0..100u64 {
            assert!(coordinator.get(&ItemKey::from(id)).now_or_never().is_none());
        }

        assert_eq!(store.calls(), 100);
        assert_eq!(coordinator.flights.in_flight(), 0);
    }

    #[test]
    fn evictions_are_logged() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let clock = ClockControl::new().to_clock();
        let coordinator = CacheCoordinator::builder(&clock)
            .config(CoordinatorConfig {
                local_capacity: 1,
                ..CoordinatorConfig::default()
            })
            .distributed(SharedCache::new(&clock))
            .store(InMemoryStore::catalogue())
            .build()
            .unwrap();

        block_on(coordinator.get(&ItemKey::from(1))).unwrap();
        block_on(coordinator.get(&ItemKey::from(2))).unwrap();

        assert_eq!(coordinator.local_len(), 1);
        capture.assert_contains("lookup.evicted");
        capture.assert_contains("lookup.backfill");
    }

    #[test]
    fn distributed_fault_is_logged_as_warning() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let clock = ClockControl::new().to_clock();
        let distributed = MockCache::<String, Vec<u8>>::new();
        distributed.fail_when(|op| matches!(op, CacheOp::Get(_)));
        let coordinator = CacheCoordinator::builder(&clock)
            .distributed(distributed)
            .store(InMemoryStore::catalogue())
            .build()
            .unwrap();

        assert!(block_on(coordinator.get(&ItemKey::from(3))).is_ok());
        capture.assert_contains("WARN");
        capture.assert_contains("lookup.error");
        capture.assert_contains("mock: get failed");
    }
}
