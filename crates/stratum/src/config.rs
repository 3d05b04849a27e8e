// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Coordinator configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A configuration that cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The local tier must hold at least one entry.
    #[error("local_capacity must be at least 1")]
    ZeroCapacity,

    /// A TTL was zero.
    #[error("{field} must be greater than zero")]
    ZeroTtl {
        /// The offending setting.
        field: &'static str,
    },

    /// The local TTL outlives the distributed TTL.
    #[error("local_ttl_secs ({local}) must not exceed distributed_ttl_secs ({distributed})")]
    TtlNesting {
        /// The configured local TTL in seconds.
        local: u64,
        /// The configured distributed TTL in seconds.
        distributed: u64,
    },

    /// A timeout was set to zero. Leave it unset to disable it instead.
    #[error("{field} must be greater than zero when set")]
    ZeroTimeout {
        /// The offending setting.
        field: &'static str,
    },

    /// The distributed key prefix was empty.
    #[error("key_prefix must not be empty")]
    EmptyPrefix,

    /// The configuration text could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings of a [`CacheCoordinator`](crate::CacheCoordinator).
///
/// Every field has a default, so a configuration file only needs the values it changes.
/// Unknown fields are rejected.
///
/// # Examples
///
/// ```
/// use stratum::CoordinatorConfig;
///
/// let config = CoordinatorConfig::from_toml_str(
///     r#"
///     local_capacity = 100
///     local_ttl_secs = 30
///     "#,
/// )?;
///
/// assert_eq!(config.local_capacity, 100);
/// assert_eq!(config.distributed_ttl_secs, 300);
/// # Ok::<(), stratum::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Maximum number of entries in the local tier.
    pub local_capacity: usize,
    /// TTL of local entries, in seconds.
    pub local_ttl_secs: u64,
    /// TTL of distributed entries, in seconds. Must not be lower than `local_ttl_secs`.
    pub distributed_ttl_secs: u64,
    /// Bound on each distributed-tier call, in milliseconds. A call that overruns is a miss.
    pub distributed_timeout_ms: Option<u64>,
    /// Bound on each canonical fetch, in milliseconds. A fetch that overruns fails the lookup.
    pub canonical_timeout_ms: Option<u64>,
    /// Prefix that namespaces item keys in the distributed tier.
    pub key_prefix: String,
    /// Coalesce concurrent canonical fetches of the same key into one.
    pub stampede_protection: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            local_capacity: 5,
            local_ttl_secs: 60,
            distributed_ttl_secs: 300,
            distributed_timeout_ms: Some(500),
            canonical_timeout_ms: Some(5_000),
            key_prefix: "item_".to_owned(),
            stampede_protection: true,
        }
    }
}

impl CoordinatorConfig {
    /// Parses a TOML document.
    ///
    /// Parsing does not validate the values; that happens when the coordinator is built.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, mistyped values or unknown fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Checks the configuration and converts it into the form the coordinator runs on.
    pub(crate) fn validate(&self) -> Result<Settings, ConfigError> {
        let local_capacity = NonZeroUsize::new(self.local_capacity).ok_or(ConfigError::ZeroCapacity)?;

        if self.local_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl { field: "local_ttl_secs" });
        }
        if self.distributed_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl {
                field: "distributed_ttl_secs",
            });
        }
        if self.local_ttl_secs > self.distributed_ttl_secs {
            return Err(ConfigError::TtlNesting {
                local: self.local_ttl_secs,
                distributed: self.distributed_ttl_secs,
            });
        }
        if self.distributed_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout {
                field: "distributed_timeout_ms",
            });
        }
        if self.canonical_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout {
                field: "canonical_timeout_ms",
            });
        }
        if self.key_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }

        Ok(Settings {
            local_capacity,
            local_ttl: Duration::from_secs(self.local_ttl_secs),
            distributed_ttl: Duration::from_secs(self.distributed_ttl_secs),
            distributed_timeout: self.distributed_timeout_ms.map(Duration::from_millis),
            canonical_timeout: self.canonical_timeout_ms.map(Duration::from_millis),
            key_prefix: self.key_prefix.clone(),
            stampede_protection: self.stampede_protection,
        })
    }
}

/// A validated configuration.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) local_capacity: NonZeroUsize,
    pub(crate) local_ttl: Duration,
    pub(crate) distributed_ttl: Duration,
    pub(crate) distributed_timeout: Option<Duration>,
    pub(crate) canonical_timeout: Option<Duration>,
    pub(crate) key_prefix: String,
    pub(crate) stampede_protection: bool,
}
