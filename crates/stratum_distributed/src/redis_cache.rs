// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use stratum_tier::{CacheEntry, CacheTier, Error, Expiry, Operation};

/// Number of keys requested per `SCAN` round trip when clearing a namespace.
const SCAN_BATCH: usize = 100;

/// A distributed tier backed by a Redis server.
///
/// Values are stored as raw bytes with `SET .. EX`, so expiry is enforced by the server.
/// The connection is a [`ConnectionManager`], which multiplexes requests and reconnects on
/// its own; clones of a `RedisCache` share it.
///
/// [`CacheTier::clear`] only removes keys that start with the configured namespace, found
/// with `SCAN` rather than `KEYS`.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    namespace: String,
}

impl RedisCache {
    /// Opens a managed connection to the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(|error| Error::during(Operation::Connect, error))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|error| Error::during(Operation::Connect, error))?;
        Ok(Self::from_connection(connection))
    }

    /// Wraps an existing managed connection.
    #[must_use]
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            namespace: String::new(),
        }
    }

    /// Restricts [`CacheTier::clear`] to keys starting with `namespace`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Returns the namespace cleared by [`CacheTier::clear`].
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl CacheTier<String, Vec<u8>> for RedisCache {
    async fn get(&self, key: &String) -> Result<Option<CacheEntry<Vec<u8>>>, Error> {
        let mut conn = self.connection.clone();
        let payload = conn
            .get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(failed_on(Operation::Get, key))?;
        Ok(payload.map(CacheEntry::new))
    }

    async fn insert(&self, key: &String, entry: CacheEntry<Vec<u8>>) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        let ttl = entry.ttl();
        let payload = entry.into_value();

        let written = match ttl.map(expiry_seconds) {
            // A zero TTL means the value is already stale.
            Some(0) => conn.del::<_, ()>(key).await,
            Some(seconds) => conn.set_ex::<_, _, ()>(key, payload, seconds).await,
            None => conn.set::<_, _, ()>(key, payload).await,
        };
        written.map_err(failed_on(Operation::Insert, key))
    }

    async fn invalidate(&self, key: &String) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key).await.map_err(failed_on(Operation::Invalidate, key))
    }

    async fn clear(&self) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", self.namespace);
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|error| Error::during(Operation::Clear, error))?;

            if !keys.is_empty() {
                conn.del::<_, ()>(keys)
                    .await
                    .map_err(|error| Error::during(Operation::Clear, error))?;
            }

            cursor = next;
            if cursor == 0 {
                return Ok(());
            }
        }
    }

    async fn remaining_ttl(&self, key: &String) -> Result<Expiry, Error> {
        let mut conn = self.connection.clone();
        let reply = conn
            .ttl::<_, i64>(key)
            .await
            .map_err(failed_on(Operation::RemainingTtl, key))?;
        Ok(ttl_from_reply(reply))
    }
}

fn failed_on(operation: Operation, key: &str) -> impl FnOnce(redis::RedisError) -> Error + '_ {
    move |error| Error::during(operation, error).for_key(key)
}

/// Rounds a TTL up to whole seconds, the resolution of `SET .. EX`.
fn expiry_seconds(ttl: Duration) -> u64 {
    ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)
}

/// Interprets a `TTL` reply: `-2` for a missing key, `-1` for a key without expiry.
fn ttl_from_reply(reply: i64) -> Expiry {
    match reply {
        -2 => Expiry::Absent,
        -1 => Expiry::Never,
        _ => u64::try_from(reply).map_or(Expiry::Unknown, |secs| Expiry::In(Duration::from_secs(secs))),
    }
}
