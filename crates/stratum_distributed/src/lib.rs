// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Shared TTL cache tiers.
//!
//! The distributed tier is the only consistency point between server processes: every
//! process reads and backfills the same keyed byte store, and the store removes entries on
//! its own once their TTL elapses. Both tiers in this crate implement
//! [`CacheTier<String, Vec<u8>>`](stratum_tier::CacheTier); the TTL of a write travels in
//! [`CacheEntry::with_ttl`](stratum_tier::CacheEntry::with_ttl).
//!
//! - [`SharedCache`] keeps the store in memory behind a cloneable handle. Clones see the
//!   same entries, so several coordinators in one process can stand in for several
//!   processes sharing one server.
//! - `RedisCache` (feature `redis`) talks to a Redis server over a multiplexed connection.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use stratum_distributed::SharedCache;
//! use stratum_tier::{CacheEntry, CacheTier, Expiry};
//! use tick::ClockControl;
//!
//! # futures::executor::block_on(async {
//! let control = ClockControl::new();
//! let cache = SharedCache::new(&control.to_clock());
//! let key = "item_1".to_string();
//!
//! cache.insert(&key, CacheEntry::with_ttl(b"payload".to_vec(), Duration::from_secs(300))).await?;
//! control.advance(Duration::from_secs(100));
//!
//! assert_eq!(cache.remaining_ttl(&key).await?, Expiry::In(Duration::from_secs(200)));
//! # Ok::<(), stratum_tier::Error>(())
//! # }).unwrap();
//! ```

#[cfg(feature = "redis")]
mod redis_cache;
mod shared;

#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
#[doc(inline)]
pub use redis_cache::RedisCache;
#[doc(inline)]
pub use shared::SharedCache;
