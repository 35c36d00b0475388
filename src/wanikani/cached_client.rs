//! Cached WaniKani client that wraps WaniKaniClient with transparent caching.

use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};

use crate::cache::QueryKey;
use crate::cache::{CacheLayer, CacheResult, CacheSource, NoopStorage, SqliteStorage};
use crate::config::{CacheConfig, Config};
use crate::error::{ClientError, Warning};

use super::cache::{account_tag, VocabQueryKey};
use super::client::WaniKaniClient;
use super::transport::{HttpTransport, Transport};
use super::types::{LevelVocabulary, ProgressSummary, UserInfo, VocabularySummary, MAX_LEVEL};

/// WaniKani client with transparent caching support.
///
/// Every cached operation takes a `bypass_cache` flag. Without it, a fresh
/// cache entry is returned and the network is not touched at all; with it
/// (or on a miss) the data is fetched, normalized and written back.
pub struct CachedWaniKaniClient<T = HttpTransport> {
  inner: WaniKaniClient<T>,
  cache: CacheLayer,
  account: String,
}

impl CachedWaniKaniClient<HttpTransport> {
  /// Create a new cached WaniKani client.
  pub fn new(config: &Config) -> Result<Self> {
    let token = config.api_token()?;
    let inner = WaniKaniClient::new(config)?;
    let cache = open_cache(&config.cache)?;

    Ok(Self::from_parts(inner, cache, account_tag(&token)))
  }
}

/// Build the cache layer described by `config`.
///
/// A database that cannot be opened even after recreating it never stops
/// the client: it runs uncached instead.
fn open_cache(config: &CacheConfig) -> Result<CacheLayer> {
  let max_age = Duration::try_hours(config.max_age_hours)
    .ok_or_else(|| eyre!("cache.max_age_hours is out of range: {}", config.max_age_hours))?;

  let cache = if !config.enabled {
    info!("caching disabled");
    CacheLayer::new(NoopStorage)
  } else {
    match SqliteStorage::open_or_recreate(config.path.as_deref()) {
      Ok(storage) => CacheLayer::new(storage),
      Err(e) => {
        warn!(error = %e, "cache unavailable, continuing without it");
        CacheLayer::new(NoopStorage)
      }
    }
  };

  Ok(cache.with_max_age(max_age))
}

impl<T: Transport> CachedWaniKaniClient<T> {
  pub fn from_parts(inner: WaniKaniClient<T>, cache: CacheLayer, account: String) -> Self {
    Self {
      inner,
      cache,
      account,
    }
  }

  /// All unlocked vocabulary, cached under a fixed key.
  ///
  /// A freshly fetched summary invalidates every cached level, so levels
  /// are never older than the summary. Warnings describe the fetch that
  /// produced the data and are not repeated on later cache hits.
  pub async fn get_vocabulary_summary(
    &self,
    bypass_cache: bool,
  ) -> Result<CacheResult<VocabularySummary>, ClientError> {
    let query_key = VocabQueryKey::Summary {
      account: self.account.clone(),
    };

    let mut result = self
      .cache
      .fetch(&query_key, bypass_cache, || self.inner.fetch_vocabulary())
      .await?;

    if result.source == CacheSource::Network {
      self.invalidate_levels(&mut result.warnings);
    }
    Ok(result)
  }

  fn invalidate_levels(&self, warnings: &mut Vec<Warning>) {
    for level in 0..=MAX_LEVEL {
      let key = VocabQueryKey::Level {
        account: self.account.clone(),
        level,
      };
      if let Err(e) = self.cache.invalidate(&key) {
        warn!(level, error = %e, "failed to invalidate cached level");
        warnings.push(Warning::CacheWrite {
          key: key.description(),
          reason: e.to_string(),
        });
        return;
      }
    }
  }

  /// Unlocked vocabulary of one level, cached under a level-specific key.
  ///
  /// On a miss the level is cut out of the vocabulary summary, which may
  /// itself come from the cache unless `bypass_cache` is set.
  pub async fn get_vocabulary_by_level(
    &self,
    level: u32,
    bypass_cache: bool,
  ) -> Result<CacheResult<LevelVocabulary>, ClientError> {
    let query_key = VocabQueryKey::Level {
      account: self.account.clone(),
      level,
    };

    self
      .cache
      .fetch(&query_key, bypass_cache, || async move {
        let summary = self.get_vocabulary_summary(bypass_cache).await?;
        Ok::<_, ClientError>((summary.data.by_level(level), summary.warnings))
      })
      .await
  }

  /// Entry counts per SRS bucket, computed from the vocabulary summary.
  pub async fn get_vocabulary_progress(
    &self,
    bypass_cache: bool,
  ) -> Result<CacheResult<ProgressSummary>, ClientError> {
    let summary = self.get_vocabulary_summary(bypass_cache).await?;
    Ok(summary.map(|s| s.progress()))
  }

  /// Get user information (not cached - level and subscription change).
  pub async fn get_user_information(&self) -> Result<UserInfo, ClientError> {
    self.inner.get_user().await
  }

  /// Drop every cached entry.
  pub fn invalidate_all(&self) -> Result<usize> {
    self.cache.clear()
  }
}
