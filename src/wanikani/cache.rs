//! Caching implementations for WaniKani types.

use sha2::{Digest, Sha256};

use crate::cache::{Cacheable, QueryKey};

use super::types::{LevelVocabulary, VocabularySummary};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for VocabularySummary {
  fn payload_type() -> &'static str {
    "vocabulary_summary"
  }
}

impl Cacheable for LevelVocabulary {
  fn payload_type() -> &'static str {
    "level_vocabulary"
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for cached WaniKani operations.
///
/// `account` identifies the token the data was fetched with, so two
/// accounts sharing a cache directory never see each other's vocabulary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VocabQueryKey {
  /// All unlocked vocabulary
  Summary { account: String },
  /// Unlocked vocabulary of one level
  Level { account: String, level: u32 },
}

impl QueryKey for VocabQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Summary { account } => format!("vocabulary_summary:{}", account),
      Self::Level { account, level } => format!("vocabulary_level:{}:{}", account, level),
    };

    // SHA256 hash for stable, fixed-length keys
    sha256_hex(&input)
  }

  fn description(&self) -> String {
    match self {
      Self::Summary { .. } => "vocabulary summary".to_string(),
      Self::Level { level, .. } => format!("level {} vocabulary", level),
    }
  }
}

/// Short, non-reversible tag identifying an API token.
pub fn account_tag(token: &str) -> String {
  sha256_hex(token)[..16].to_string()
}

fn sha256_hex(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn summary(account: &str) -> VocabQueryKey {
    VocabQueryKey::Summary {
      account: account.to_string(),
    }
  }

  fn level(account: &str, level: u32) -> VocabQueryKey {
    VocabQueryKey::Level {
      account: account.to_string(),
      level,
    }
  }

  #[test]
  fn test_identical_requests_share_a_key() {
    assert_eq!(summary("a").cache_hash(), summary("a").cache_hash());
    assert_eq!(level("a", 3).cache_hash(), level("a", 3).cache_hash());
  }

  #[test]
  fn test_parameters_change_the_key() {
    assert_ne!(level("a", 3).cache_hash(), level("a", 4).cache_hash());
    assert_ne!(level("a", 3).cache_hash(), level("b", 3).cache_hash());
    assert_ne!(summary("a").cache_hash(), level("a", 0).cache_hash());
  }

  #[test]
  fn test_hash_is_fixed_length_hex() {
    let hash = level("a", 60).cache_hash();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_account_tag_is_stable_per_token() {
    let tag = account_tag("secret-token-1234");
    assert_eq!(tag.len(), 16);
    assert_ne!(tag, account_tag("another-token"));
    assert_eq!(tag, account_tag("secret-token-1234"));
  }
}
