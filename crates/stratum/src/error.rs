// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Errors surfaced by the coordinator.

use std::sync::Arc;
use std::time::Duration;

use crate::ItemKey;

/// Why a lookup produced no record.
///
/// Distributed-tier faults never appear here: they are absorbed and the lookup continues
/// to the canonical store. The error is cheap to clone so that every caller waiting on a
/// coalesced fetch receives the same outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    /// The canonical store has no record for the key. Never cached.
    #[error("item {key} not found")]
    NotFound {
        /// The key that was looked up.
        key: ItemKey,
    },

    /// The canonical store failed to answer.
    #[error("canonical store failed to look up item {key}")]
    Canonical {
        /// The key that was looked up.
        key: ItemKey,
        /// The store's error.
        #[source]
        source: Arc<crate::Error>,
    },

    /// The canonical store did not answer within the configured timeout.
    #[error("canonical store did not answer for item {key} within {timeout:?}")]
    CanonicalTimeout {
        /// The key that was looked up.
        key: ItemKey,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl LookupError {
    /// Returns the key of the failed lookup.
    #[must_use]
    pub fn key(&self) -> &ItemKey {
        match self {
            Self::NotFound { key } | Self::Canonical { key, .. } | Self::CanonicalTimeout { key, .. } => key,
        }
    }

    /// Returns `true` if the record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the canonical store failed or timed out.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        !self.is_not_found()
    }
}
