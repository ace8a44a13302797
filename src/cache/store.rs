//! In-memory TTL cache shared by all fetch subscriptions.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::pattern::KeyPattern;

/// One cached value. Entries are serialized through serde_json so a single
/// store can hold responses of different types.
#[derive(Debug, Clone)]
struct Entry {
  value: serde_json::Value,
  inserted_at: Instant,
  ttl: Duration,
}

impl Entry {
  /// An entry is valid iff `now - inserted_at <= ttl`.
  fn is_expired(&self, now: Instant) -> bool {
    now.duration_since(self.inserted_at) > self.ttl
  }
}

/// Size counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
  pub size: usize,
  pub max_size: usize,
  pub hits: u64,
  pub misses: u64,
}

/// In-memory key/value store with per-entry TTL and a capacity bound.
///
/// Expiry is evaluated lazily: `get`/`has` delete expired entries as a side
/// effect of the read, and a periodic sweeper (see [`Self::spawn_sweeper`])
/// removes entries nobody reads. When a `set` would exceed capacity the store
/// first sweeps expired entries, then evicts the entry with the oldest
/// insertion time. Eviction is insertion-order, not access-order, so a
/// frequently read key can still be evicted once it is the oldest.
///
/// No operation returns an error; absence, expiry, and undecodable entries
/// all read as a miss.
pub struct MemoryCache {
  entries: Mutex<HashMap<String, Entry>>,
  max_size: usize,
  default_ttl: Duration,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl MemoryCache {
  /// Create a store sized per the application's cache configuration.
  pub fn from_config(config: &crate::config::CacheConfig) -> Self {
    Self::new(
      config.max_size,
      Duration::from_millis(config.default_ttl_ms),
    )
  }

  /// Create a store holding at most `max_size` entries. `default_ttl` applies
  /// to `set` calls that don't pass an explicit TTL.
  pub fn new(max_size: usize, default_ttl: Duration) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      max_size: max_size.max(1),
      default_ttl,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  /// Look up a value. Expired entries are deleted by the read; a value that
  /// fails to deserialize as `T` is a miss.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let now = Instant::now();
    let value = {
      let mut entries = self.entries.lock().ok()?;
      let expired = entries.get(key).map(|entry| entry.is_expired(now));
      match expired {
        Some(true) => {
          entries.remove(key);
          None
        }
        Some(false) => entries.get(key).map(|entry| entry.value.clone()),
        None => None,
      }
    };

    match value.and_then(|v| serde_json::from_value(v).ok()) {
      Some(decoded) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(decoded)
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  /// Insert a value, replacing any existing entry under the same key
  /// (last-write-wins). A value that fails to serialize is dropped silently.
  pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
    let encoded = match serde_json::to_value(value) {
      Ok(v) => v,
      Err(err) => {
        warn!(key, %err, "unserializable value, not caching");
        return;
      }
    };

    let now = Instant::now();
    let Ok(mut entries) = self.entries.lock() else {
      return;
    };

    // Replacing an existing key never changes the entry count
    if !entries.contains_key(key) && entries.len() >= self.max_size {
      entries.retain(|_, entry| !entry.is_expired(now));

      if entries.len() >= self.max_size {
        let oldest = entries
          .iter()
          .min_by_key(|(_, entry)| entry.inserted_at)
          .map(|(k, _)| k.clone());
        if let Some(oldest) = oldest {
          debug!(evicted = %oldest, "cache at capacity, evicting oldest entry");
          entries.remove(&oldest);
        }
      }
    }

    entries.insert(
      key.to_string(),
      Entry {
        value: encoded,
        inserted_at: now,
        ttl: ttl.unwrap_or(self.default_ttl),
      },
    );
  }

  /// Whether a valid (unexpired) entry exists. Expired entries are deleted.
  pub fn has(&self, key: &str) -> bool {
    let now = Instant::now();
    let Ok(mut entries) = self.entries.lock() else {
      return false;
    };
    let expired = entries.get(key).map(|entry| entry.is_expired(now));
    match expired {
      Some(true) => {
        entries.remove(key);
        false
      }
      Some(false) => true,
      None => false,
    }
  }

  /// Remove an entry. Returns whether anything was removed.
  pub fn delete(&self, key: &str) -> bool {
    self
      .entries
      .lock()
      .map(|mut entries| entries.remove(key).is_some())
      .unwrap_or(false)
  }

  /// Remove every entry.
  pub fn clear(&self) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.clear();
    }
  }

  /// Delete every key matching `pattern` and return the count. A plain string
  /// without regex metacharacters deletes exactly that key; an invalid regex
  /// deletes nothing.
  pub fn invalidate_pattern(&self, pattern: &str) -> usize {
    let Some(pattern) = KeyPattern::parse(pattern) else {
      return 0;
    };
    let Ok(mut entries) = self.entries.lock() else {
      return 0;
    };
    let before = entries.len();
    entries.retain(|key, _| !pattern.matches(key));
    let removed = before - entries.len();
    if removed > 0 {
      debug!(removed, "invalidated cache entries");
    }
    removed
  }

  /// Currently valid keys; expired ones are filtered out (and removed).
  pub fn keys(&self) -> Vec<String> {
    let now = Instant::now();
    let Ok(mut entries) = self.entries.lock() else {
      return Vec::new();
    };
    entries.retain(|_, entry| !entry.is_expired(now));
    entries.keys().cloned().collect()
  }

  /// Drop every expired entry and return how many were removed.
  pub fn sweep(&self) -> usize {
    let now = Instant::now();
    let Ok(mut entries) = self.entries.lock() else {
      return 0;
    };
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      size: self.entries.lock().map(|e| e.len()).unwrap_or(0),
      max_size: self.max_size,
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
    }
  }

  /// Spawn a background task that sweeps expired entries on a coarse
  /// interval. Purely an optimization: reads already self-clean, this keeps
  /// unread stale entries from accumulating. The caller owns the handle and
  /// aborts it on shutdown.
  pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
    let cache = Arc::clone(self);
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      // The first tick fires immediately; skip it
      ticker.tick().await;
      loop {
        ticker.tick().await;
        let removed = cache.sweep();
        if removed > 0 {
          debug!(removed, "periodic sweep removed expired entries");
        }
      }
    })
  }
}

impl std::fmt::Debug for MemoryCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let stats = self.stats();
    f.debug_struct("MemoryCache")
      .field("size", &stats.size)
      .field("max_size", &stats.max_size)
      .finish_non_exhaustive()
  }
}
