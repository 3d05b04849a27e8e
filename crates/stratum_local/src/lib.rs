// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Bounded in-process cache tier.
//!
//! This crate provides [`LocalCache`], the fastest tier of the stratum lookup chain. It holds
//! at most a fixed number of entries, evicts strictly in least-recently-accessed order and
//! expires entries lazily: an entry older than its TTL is treated as absent and dropped the
//! next time the cache is touched. Use [`LocalCacheBuilder`] to configure capacity, default
//! TTL and a name.
//!
//! # Quick Start
//!
//! ```
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! use stratum_local::LocalCache;
//! use tick::Clock;
//!
//! let clock = Clock::new_frozen();
//! let cache = LocalCache::<String, i32>::builder(&clock)
//!     .capacity(NonZeroUsize::new(2).unwrap())
//!     .build();
//!
//! cache.set("a".to_string(), 1, Duration::from_secs(60));
//! cache.set("b".to_string(), 2, Duration::from_secs(60));
//!
//! // Touching "a" makes "b" the eviction candidate.
//! assert_eq!(cache.get(&"a".to_string()), Some(1));
//! let evicted = cache.set("c".to_string(), 3, Duration::from_secs(60));
//! assert_eq!(evicted, Some(("b".to_string(), 2)));
//! ```
//!
//! # Features
//!
//! - **Capacity bound**: the entry count never exceeds the configured capacity
//! - **Strict LRU**: eviction order follows the last access, earlier insertions first on ties
//! - **Lazy TTL**: expiry is checked on access against the injected [`tick::Clock`]
//! - **Synchronous**: no operation suspends, so a lookup hit performs no I/O

mod builder;
mod cache;
mod tier;

#[doc(inline)]
pub use builder::LocalCacheBuilder;
#[doc(inline)]
pub use cache::LocalCache;
