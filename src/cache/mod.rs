//! Generic caching layer for fetched payloads.
//!
//! This module provides an API-agnostic caching mechanism that:
//! - Stores one serialized payload per deterministic query key
//! - Persists to SQLite so entries survive restarts
//! - Treats unreadable entries as misses and repairs them on the next fetch
//! - Supports explicit bypass and invalidation

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, NoopStorage, ResetOutcome, SqliteStorage, StoredEntry};
pub use traits::{CacheResult, CacheSource, Cacheable, CachedEntry, Lookup, QueryKey};
