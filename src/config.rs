use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ClientError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// WaniKani personal access token (v2). Environment variables take precedence.
  pub api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Value sent as the `Wanikani-Revision` header
  pub revision: String,
  /// Minimum spacing between requests
  pub min_request_interval_ms: u64,
  /// Per-request timeout; a timeout counts as a transient failure
  pub request_timeout_secs: u64,
  pub max_retries: u32,
  /// Backoff before the first retry, doubled for each further retry
  pub retry_backoff_ms: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.wanikani.com/v2".to_string(),
      revision: "20170710".to_string(),
      min_request_interval_ms: 1000,
      request_timeout_secs: 30,
      max_retries: 3,
      retry_backoff_ms: 500,
    }
  }
}

impl ApiConfig {
  pub fn min_request_interval(&self) -> Duration {
    Duration::from_millis(self.min_request_interval_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn retry_backoff(&self) -> Duration {
    Duration::from_millis(self.retry_backoff_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  /// Cached results older than this are refetched
  pub max_age_hours: i64,
  /// Database location (default: $XDG_DATA_HOME/wk-vocab/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      max_age_hours: 24,
      path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./wk-vocab.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/wk-vocab/config.yaml
  ///
  /// Every setting has a default, so a missing file yields the defaults.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("wk-vocab.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("wk-vocab").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the WaniKani API token.
  ///
  /// Checks WK_VOCAB_API_TOKEN first, then WANIKANI_API_TOKEN, then `api_token`
  /// from the config file.
  pub fn api_token(&self) -> std::result::Result<String, ClientError> {
    std::env::var("WK_VOCAB_API_TOKEN")
      .or_else(|_| std::env::var("WANIKANI_API_TOKEN"))
      .ok()
      .or_else(|| self.api_token.clone())
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty())
      .ok_or_else(|| ClientError::Auth {
        reason: "no API token found. Set WK_VOCAB_API_TOKEN or WANIKANI_API_TOKEN, \
                 or add api_token to the config file"
          .to_string(),
      })
  }
}
