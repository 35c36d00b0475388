//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// A raw cache slot as persisted by a storage backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
  pub payload_type: String,
  pub payload: Vec<u8>,
  pub fetched_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Backends deal in opaque bytes; typing happens in the cache layer.
pub trait CacheStorage: Send + Sync {
  /// Get the slot stored under `key`.
  fn get(&self, key: &str) -> Result<Option<StoredEntry>>;

  /// Store a payload under `key`, replacing any previous value.
  fn put(&self, key: &str, description: &str, payload_type: &str, payload: &[u8]) -> Result<()>;

  /// Remove the slot stored under `key`. Returns whether one existed.
  fn invalidate(&self, key: &str) -> Result<bool>;

  /// Remove every slot. Returns the number removed.
  fn clear(&self) -> Result<usize>;
}

/// What [`SqliteStorage::reset`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
  /// The database was readable; this many entries were removed
  Cleared(usize),
  /// The database file was unreadable and has been deleted
  Deleted(PathBuf),
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<StoredEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _key: &str, _description: &str, _payload_type: &str, _payload: &[u8]) -> Result<()> {
    Ok(()) // Discard
  }

  fn invalidate(&self, _key: &str) -> Result<bool> {
    Ok(false)
  }

  fn clear(&self) -> Result<usize> {
    Ok(0)
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open the cache database, replacing the file if it cannot be read.
  ///
  /// Cached data can always be refetched, so a damaged or foreign file at
  /// the cache path is deleted rather than reported.
  pub fn open_or_recreate(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    match Self::open(Some(&path)) {
      Ok(storage) => Ok(storage),
      Err(e) if path.is_file() => {
        warn!(path = %path.display(), error = %e, "cache database unreadable, recreating");
        Self::remove(&path)?;
        Self::open(Some(&path))
      }
      Err(e) => Err(e),
    }
  }

  /// Remove every entry from the cache database at `path`.
  ///
  /// A database that cannot be opened is deleted instead.
  pub fn reset(path: Option<&Path>) -> Result<ResetOutcome> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    match Self::open(Some(&path)) {
      Ok(storage) => Ok(ResetOutcome::Cleared(storage.clear()?)),
      Err(e) if path.is_file() => {
        warn!(path = %path.display(), error = %e, "cache database unreadable, deleting");
        Self::remove(&path)?;
        Ok(ResetOutcome::Deleted(path))
      }
      Err(e) => Err(e),
    }
  }

  fn remove(path: &Path) -> Result<()> {
    std::fs::remove_file(path)
      .map_err(|e| eyre!("Failed to delete cache database {}: {}", path.display(), e))?;

    // Leftover rollback journal of the old file
    let mut journal = path.as_os_str().to_owned();
    journal.push("-journal");
    let _ = std::fs::remove_file(PathBuf::from(journal));
    Ok(())
  }

  /// Open a throwaway in-memory cache.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("wk-vocab").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn corrupt_timestamp(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    conn.execute(
      "UPDATE cache_entries SET fetched_at = 'yesterday-ish' WHERE key = ?",
      params![key],
    )?;
    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One serialized payload per cache key
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    payload_type TEXT NOT NULL,
    payload BLOB NOT NULL,
    fetched_at TEXT NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT payload_type, payload, fetched_at FROM cache_entries WHERE key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    match row {
      Some((payload_type, payload, fetched_at)) => Ok(Some(StoredEntry {
        payload_type,
        payload,
        fetched_at: parse_datetime(&fetched_at)?,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, key: &str, description: &str, payload_type: &str, payload: &[u8]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // A single statement, so the slot is either fully replaced or untouched
    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (key, description, payload_type, payload, fetched_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          key,
          description,
          payload_type,
          payload,
          Utc::now().to_rfc3339()
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn invalidate(&self, key: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute("DELETE FROM cache_entries WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to invalidate cache entry: {}", e))?;

    Ok(removed > 0)
  }

  fn clear(&self) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))
  }
}

/// Parse a stored RFC 3339 timestamp.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
