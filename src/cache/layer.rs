//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, CachedEntry, Cacheable, Lookup, QueryKey};
use crate::error::Warning;

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the client façade and the network client,
/// serving fresh cache hits without touching the network and writing
/// fresh results back as a separate step once a fetch has fully succeeded.
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  /// How long before cached data is considered stale
  max_age: Duration,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: impl CacheStorage + 'static) -> Self {
    Self {
      storage: Arc::new(storage),
      max_age: Duration::hours(24),
    }
  }

  /// Set how long cached data stays valid.
  pub fn with_max_age(mut self, max_age: Duration) -> Self {
    self.max_age = max_age;
    self
  }

  /// Check if cached data is stale based on its fetch timestamp.
  fn is_stale(&self, fetched_at: DateTime<Utc>) -> bool {
    Utc::now() - fetched_at > self.max_age
  }

  /// Read and decode the payload stored under `key`.
  ///
  /// Unreadable slots, undecodable payloads and payloads of another type
  /// all come back as [`Lookup::Corrupt`], never as an error.
  pub fn get<T: Cacheable>(&self, key: &impl QueryKey) -> Lookup<T> {
    let entry = match self.storage.get(&key.cache_hash()) {
      Ok(Some(entry)) => entry,
      Ok(None) => return Lookup::Miss,
      Err(e) => return Lookup::Corrupt(e.to_string()),
    };

    if entry.payload_type != T::payload_type() {
      return Lookup::Corrupt(format!(
        "expected {} payload, found {}",
        T::payload_type(),
        entry.payload_type
      ));
    }

    match serde_json::from_slice(&entry.payload) {
      Ok(payload) => Lookup::Hit(CachedEntry {
        payload,
        fetched_at: entry.fetched_at,
      }),
      Err(e) => Lookup::Corrupt(format!("undecodable payload: {}", e)),
    }
  }

  /// Serialize and store `payload` under `key`, replacing any previous value.
  pub fn put<T: Cacheable>(&self, key: &impl QueryKey, payload: &T) -> Result<()> {
    let data = serde_json::to_vec(payload).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;
    self
      .storage
      .put(&key.cache_hash(), &key.description(), T::payload_type(), &data)
  }

  /// Remove the entry stored under `key`.
  pub fn invalidate(&self, key: &impl QueryKey) -> Result<bool> {
    self.storage.invalidate(&key.cache_hash())
  }

  /// Remove every entry.
  pub fn clear(&self) -> Result<usize> {
    self.storage.clear()
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Unless `bypass` is set, check cache - if fresh, return immediately
  /// 2. If stale, missing or corrupt, fetch from network
  /// 3. Store the fresh data; a failed write becomes a warning
  ///
  /// The fetcher yields the data together with any warnings it produced.
  /// Fetch errors propagate untouched and leave the cache slot as it was.
  pub async fn fetch<T, K, F, Fut, E>(
    &self,
    key: &K,
    bypass: bool,
    fetcher: F,
  ) -> std::result::Result<CacheResult<T>, E>
  where
    T: Cacheable,
    K: QueryKey,
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<(T, Vec<Warning>), E>>,
  {
    let mut warnings = Vec::new();

    if bypass {
      debug!(key = %key.description(), "cache bypass requested");
    } else {
      match self.get::<T>(key) {
        Lookup::Hit(cached) if !self.is_stale(cached.fetched_at) => {
          debug!(key = %key.description(), age_secs = cached.age().num_seconds(), "cache hit");
          return Ok(CacheResult::from_cache(cached.payload, cached.fetched_at));
        }
        Lookup::Hit(cached) => {
          debug!(key = %key.description(), fetched_at = %cached.fetched_at, "cache entry stale");
        }
        Lookup::Miss => debug!(key = %key.description(), "cache miss"),
        Lookup::Corrupt(reason) => {
          warn!(key = %key.description(), %reason, "corrupt cache entry, refetching");
          warnings.push(Warning::CacheCorruption {
            key: key.description(),
            reason,
          });
        }
      }
    }

    let (data, fetch_warnings) = fetcher().await?;
    warnings.extend(fetch_warnings);

    if let Err(e) = self.put(key, &data) {
      warn!(key = %key.description(), error = %e, "failed to write cache entry");
      warnings.push(Warning::CacheWrite {
        key: key.description(),
        reason: e.to_string(),
      });
    }

    Ok(CacheResult::from_network(data, warnings))
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      max_age: self.max_age,
    }
  }
}
