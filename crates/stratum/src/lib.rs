// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A tiered read-through item cache.
//!
//! Lookups go through three tiers, fastest first:
//!
//! 1. a bounded in-process LRU ([`stratum_local::LocalCache`]) owned by each process,
//! 2. a shared TTL store reached by every process ([`SharedCache`], or `RedisCache` with the
//!    `redis` feature),
//! 3. the authoritative [`CanonicalStore`].
//!
//! The [`CacheCoordinator`] answers from the first tier that holds the item and writes every
//! deeper hit back into the faster tiers. The shared tier fails open: when it is unreachable,
//! slow or returns garbage, lookups carry on against the canonical store.
//!
//! # Quick Start
//!
//! ```
//! use stratum::{CacheCoordinator, InMemoryStore, ItemKey, SharedCache};
//! use tick::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new_frozen();
//! let shared = SharedCache::new(&clock);
//!
//! // Two processes sharing one distributed tier.
//! let first = CacheCoordinator::builder(&clock)
//!     .distributed(shared.clone())
//!     .store(InMemoryStore::catalogue())
//!     .build()?;
//! let second = CacheCoordinator::builder(&clock)
//!     .distributed(shared)
//!     .store(InMemoryStore::catalogue())
//!     .build()?;
//!
//! let laptop = first.get(&ItemKey::from(1)).await?;
//! // Served from the shared tier, populated by the first process.
//! assert_eq!(second.get(&ItemKey::from(1)).await?, laptop);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```
//!
//! # Configuration
//!
//! [`CoordinatorConfig`] holds capacity, TTLs, timeouts, the shared key prefix and the
//! stampede switch. It deserializes from TOML and is validated when the coordinator is
//! built.
//!
//! # Stampede Protection
//!
//! With `stampede_protection` enabled (the default), concurrent lookups that miss both cache
//! tiers for the same key share a single canonical fetch.
//!
//! # Telemetry
//!
//! Every tier outcome is emitted as a `tracing` event named `lookup.event`. With the
//! `metrics` feature, [`LookupTelemetry::with_metrics`] also records OpenTelemetry counters,
//! durations and the local tier size.
//!
//! # Testing
//!
//! The `test-util` feature exposes [`testing::MockStore`], a canonical store with call
//! counting and fault injection.

pub mod codec;
mod coalesce;
mod config;
mod coordinator;
mod error;
mod item;
mod store;
mod telemetry;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

#[doc(inline)]
pub use config::{ConfigError, CoordinatorConfig};
#[doc(inline)]
pub use coordinator::{CacheCoordinator, CoordinatorBuilder};
#[doc(inline)]
pub use error::LookupError;
#[doc(inline)]
pub use item::{InvalidItemKey, ItemKey, ItemValue};
#[doc(inline)]
pub use store::{CanonicalStore, InMemoryStore};
#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub use stratum_distributed::RedisCache;
pub use stratum_distributed::SharedCache;
pub use stratum_tier::{CacheEntry, CacheTier, Error, Expiry, Operation};
#[doc(inline)]
pub use telemetry::LookupTelemetry;
