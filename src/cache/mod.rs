//! Generic caching layer shared by all fetch subscriptions.
//!
//! A single in-memory store that:
//! - Holds serde_json-encoded values under string keys with per-entry TTLs
//! - Enforces a capacity bound (sweep expired first, then evict oldest)
//! - Supports exact-key and regex pattern invalidation
//! - Self-cleans lazily on read, with an optional periodic sweeper task

mod pattern;
mod store;

pub use pattern::KeyPattern;
pub use store::{CacheStats, MemoryCache};
