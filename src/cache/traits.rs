//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Warning;

/// Trait for payloads that can be cached.
///
/// A payload is stored as one serialized blob per cache key, tagged with its
/// payload type so a slot written by one type is never decoded as another.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Payload type name for storage organization (e.g., "vocabulary_summary")
  fn payload_type() -> &'static str;
}

/// Trait for keys that identify a cached operation and its parameters.
pub trait QueryKey {
  /// Stable, fixed-length hash used as the storage key.
  fn cache_hash(&self) -> String;

  /// Human readable description for logs and warnings.
  fn description(&self) -> String;
}

/// A payload read back from the cache.
#[derive(Debug, Clone)]
pub struct CachedEntry<T> {
  pub payload: T,
  pub fetched_at: DateTime<Utc>,
}

impl<T> CachedEntry<T> {
  pub fn age(&self) -> chrono::Duration {
    Utc::now() - self.fetched_at
  }
}

/// Outcome of a typed cache lookup.
#[derive(Debug, Clone)]
pub enum Lookup<T> {
  Hit(CachedEntry<T>),
  Miss,
  /// The slot exists but could not be read or decoded
  Corrupt(String),
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from the network (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
  /// Soft problems encountered while producing `data`
  pub warnings: Vec<Warning>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, warnings: Vec<Warning>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
      warnings,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
      warnings: Vec::new(),
    }
  }

  /// Transform the data while keeping source metadata and warnings.
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      cached_at: self.cached_at,
      warnings: self.warnings,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still within its max age
  Cache,
}
