//! Per-subscription configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::client::ApiError;

pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// Configuration for one fetch subscription.
///
/// The retry fields describe the coordinator's *outer* budget, layered on top
/// of the request client's internal retry loop: one coordinator attempt may
/// already represent several client-level retries.
pub struct FetchOptions<T> {
  /// Explicit cache key; derived from the request when absent
  pub cache_key: Option<String>,
  /// TTL for write-through entries; the cache default when `None`
  pub cache_ttl: Option<Duration>,
  /// Never consult or populate the cache
  pub skip_cache: bool,
  /// Whether the subscription starts enabled (auto-fetch on creation)
  pub enabled: bool,
  /// Debounce window for enablement flapping
  pub debounce: Duration,
  /// Outer retry budget
  pub retry_count: u32,
  /// Delay between outer retries
  pub retry_delay: Duration,
  pub refetch_on_focus: bool,
  pub refetch_on_reconnect: bool,
  pub on_success: Option<SuccessCallback<T>>,
  pub on_error: Option<ErrorCallback>,
}

impl<T> FetchOptions<T> {
  pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
    self.cache_key = Some(key.into());
    self
  }

  pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
    self.cache_ttl = Some(ttl);
    self
  }

  pub fn skip_cache(mut self) -> Self {
    self.skip_cache = true;
    self
  }

  pub fn with_enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn with_debounce(mut self, debounce: Duration) -> Self {
    self.debounce = debounce;
    self
  }

  pub fn with_retries(mut self, count: u32, delay: Duration) -> Self {
    self.retry_count = count;
    self.retry_delay = delay;
    self
  }

  pub fn refetch_on_focus(mut self) -> Self {
    self.refetch_on_focus = true;
    self
  }

  pub fn refetch_on_reconnect(mut self) -> Self {
    self.refetch_on_reconnect = true;
    self
  }

  pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
    self.on_success = Some(Arc::new(callback));
    self
  }

  pub fn on_error(mut self, callback: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
    self.on_error = Some(Arc::new(callback));
    self
  }
}

impl<T> Default for FetchOptions<T> {
  fn default() -> Self {
    Self {
      cache_key: None,
      cache_ttl: None,
      skip_cache: false,
      enabled: true,
      debounce: Duration::ZERO,
      retry_count: 0,
      retry_delay: Duration::from_millis(500),
      refetch_on_focus: false,
      refetch_on_reconnect: false,
      on_success: None,
      on_error: None,
    }
  }
}

impl<T> Clone for FetchOptions<T> {
  fn clone(&self) -> Self {
    Self {
      cache_key: self.cache_key.clone(),
      cache_ttl: self.cache_ttl,
      skip_cache: self.skip_cache,
      enabled: self.enabled,
      debounce: self.debounce,
      retry_count: self.retry_count,
      retry_delay: self.retry_delay,
      refetch_on_focus: self.refetch_on_focus,
      refetch_on_reconnect: self.refetch_on_reconnect,
      on_success: self.on_success.clone(),
      on_error: self.on_error.clone(),
    }
  }
}

impl<T> std::fmt::Debug for FetchOptions<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FetchOptions")
      .field("cache_key", &self.cache_key)
      .field("cache_ttl", &self.cache_ttl)
      .field("skip_cache", &self.skip_cache)
      .field("enabled", &self.enabled)
      .field("debounce", &self.debounce)
      .field("retry_count", &self.retry_count)
      .field("retry_delay", &self.retry_delay)
      .field("refetch_on_focus", &self.refetch_on_focus)
      .field("refetch_on_reconnect", &self.refetch_on_reconnect)
      .finish_non_exhaustive()
  }
}
