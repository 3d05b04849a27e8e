// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Core cache tier abstractions for the stratum tiered item cache.
//!
//! This crate defines the [`CacheTier`] trait that every tier of the lookup chain satisfies,
//! along with [`CacheEntry`] for storing values with their TTL metadata and the opaque
//! [`Error`] type returned by fallible tier operations.
//!
//! # Overview
//!
//! A tier is a keyed store with optional per-entry expiry. The in-process tier lives in
//! `stratum_local`, the shared tier in `stratum_distributed`, and the `stratum` crate
//! chains them in front of the canonical store.
//!
//! # Implementing a Cache Tier
//!
//! ```
//! use stratum_tier::{CacheEntry, CacheTier, Error};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//!
//! struct SimpleCache<K, V>(RwLock<HashMap<K, CacheEntry<V>>>);
//!
//! impl<K, V> CacheTier<K, V> for SimpleCache<K, V>
//! where
//!     K: Clone + Eq + std::hash::Hash + Send + Sync,
//!     V: Clone + Send + Sync,
//! {
//!     async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.clone(), entry);
//!         Ok(())
//!     }
//!
//!     async fn invalidate(&self, key: &K) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//!
//!     async fn clear(&self) -> Result<(), Error> {
//!         self.0.write().unwrap().clear();
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Testing
//!
//! Enable the `test-util` feature for [`testing::MockCache`], a recording tier with
//! failure injection, useful for exercising fail-open paths.

mod entry;
pub mod error;
mod expiry;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
pub(crate) mod tier;

#[doc(inline)]
pub use entry::CacheEntry;
#[doc(inline)]
pub use error::{Error, Operation, Result};
#[doc(inline)]
pub use expiry::Expiry;
#[doc(inline)]
pub use tier::CacheTier;
