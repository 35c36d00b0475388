//! Failures and soft warnings reported by the WaniKani client.
//!
//! Only [`ClientError`] crosses the client boundary as a failure. Everything
//! that goes wrong in the cache or while normalizing records is absorbed and
//! reported as a [`Warning`] next to a still-valid result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
  /// Missing or rejected API token. Never retried.
  #[error("WaniKani authentication failed: {reason}")]
  Auth { reason: String },

  /// Network or API failure after retries were exhausted.
  #[error("Failed to fetch {endpoint}: {message}")]
  Fetch {
    endpoint: String,
    /// Cursor (`pages.next_url`) of the page that failed, `None` for the first page
    cursor: Option<String>,
    message: String,
  },
}

impl ClientError {
  pub fn fetch(endpoint: &str, cursor: Option<&str>, message: impl Into<String>) -> Self {
    Self::Fetch {
      endpoint: endpoint.to_string(),
      cursor: cursor.map(String::from),
      message: message.into(),
    }
  }

  pub fn is_auth(&self) -> bool {
    matches!(self, Self::Auth { .. })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
  /// A cache slot could not be read back; a live fetch replaced it.
  #[error("cache entry for {key} was unreadable ({reason}); refetched")]
  CacheCorruption { key: String, reason: String },

  /// Fresh data was fetched but could not be written to the cache.
  #[error("could not cache {key}: {reason}")]
  CacheWrite { key: String, reason: String },

  /// Assignments without a matching subject were dropped, malformed records skipped.
  #[error("dropped {dropped} assignment(s) without a subject, skipped {rejected} malformed record(s)")]
  Normalization { dropped: usize, rejected: usize },
}
