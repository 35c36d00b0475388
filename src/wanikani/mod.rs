//! WaniKani API client: pagination, rate limiting, normalization and caching.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod normalize;
pub mod paginator;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use cached_client::CachedWaniKaniClient;
pub use client::WaniKaniClient;
