//! Per-subscription fetch coordinator.
//!
//! `Fetcher<T>` ties the cache store and a fetch closure together: it
//! resolves from cache when allowed, supersedes in-flight attempts via a
//! monotonic generation counter, applies an outer retry budget independent of
//! the request client's internal loop, and writes successful results through
//! to the cache.
//!
//! # Example
//!
//! ```ignore
//! let fetcher = Fetcher::new(cache, "api:GET:/widgets", FetchOptions::default(), move || {
//!   let client = client.clone();
//!   async move { client.get_json::<Vec<Widget>>("/widgets").await }
//! });
//!
//! fetcher.ready().await;
//! match fetcher.state() {
//!   FetchState::Success(widgets) => render(widgets),
//!   FetchState::Error(err) => render_error(&err),
//!   _ => render_spinner(),
//! }
//! ```

use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::MemoryCache;
use crate::client::{ApiClient, ApiError};

use super::options::FetchOptions;
use super::signals::RefreshSignals;
use super::state::FetchState;

/// Values a subscription can carry: cloneable into state snapshots and
/// JSON-encodable for cache write-through.
pub trait FetchValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
impl<T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static> FetchValue for T {}

/// Derive a cache key from the request identity. Pure and deterministic:
/// an explicit key wins, otherwise the method and URL identify the request.
pub fn derive_cache_key(explicit: Option<&str>, method: &reqwest::Method, url: &str) -> String {
  match explicit {
    Some(key) => key.to_string(),
    None => format!("api:{method}:{url}"),
  }
}

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

struct Inner<T> {
  fetch: FetchFn<T>,
  cache: Arc<MemoryCache>,
  key: String,
  opts: FetchOptions<T>,
  /// Monotonic supersession token: an attempt may only mutate state while
  /// its captured generation is still current.
  generation: AtomicU64,
  /// Outer retries consumed since the last success.
  retries_used: AtomicU32,
  /// Debounced enablement flag; gates automatic triggers only.
  enabled: AtomicBool,
  state: watch::Sender<FetchState<T>>,
  /// In-flight attempt (or pending retry sleeper); aborted on supersession.
  current: Mutex<Option<JoinHandle<()>>>,
  /// Pending debounced enablement evaluation.
  pending_enable: Mutex<Option<JoinHandle<()>>>,
}

/// One coordinator instance per subscription. Dropping it tears the
/// subscription down: the in-flight attempt and all listener tasks are
/// aborted.
pub struct Fetcher<T: FetchValue> {
  inner: Arc<Inner<T>>,
  listeners: Vec<JoinHandle<()>>,
}

impl<T: FetchValue> Fetcher<T> {
  /// Create a subscription with the given cache key and fetch closure.
  ///
  /// When `opts.enabled` is set (the default) an initial cache-aware trigger
  /// is scheduled through the debounce path.
  pub fn new<F, Fut>(
    cache: Arc<MemoryCache>,
    key: impl Into<String>,
    opts: FetchOptions<T>,
    fetcher: F,
  ) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let key = opts.cache_key.clone().unwrap_or_else(|| key.into());
    let (state, _) = watch::channel(FetchState::Idle);
    let enabled = opts.enabled;

    let inner = Arc::new(Inner {
      fetch: Arc::new(move || Box::pin(fetcher())),
      cache,
      key,
      opts,
      generation: AtomicU64::new(0),
      retries_used: AtomicU32::new(0),
      enabled: AtomicBool::new(false),
      state,
      current: Mutex::new(None),
      pending_enable: Mutex::new(None),
    });

    if enabled {
      Inner::set_enabled(&inner, true);
    }

    Self {
      inner,
      listeners: Vec::new(),
    }
  }

  /// Subscription for a GET endpoint, with the cache key derived from the
  /// request path unless the options name one explicitly.
  pub fn endpoint(
    cache: Arc<MemoryCache>,
    client: ApiClient,
    path: impl Into<String>,
    opts: FetchOptions<T>,
  ) -> Self {
    let path: String = path.into();
    let key = derive_cache_key(opts.cache_key.as_deref(), &reqwest::Method::GET, &path);
    let fetch_path = path.clone();
    Self::new(cache, key, opts, move || {
      let client = client.clone();
      let path = fetch_path.clone();
      async move { client.get_json::<T>(&path).await }
    })
  }

  /// Wire this subscription to the host's focus/reconnect signals, honoring
  /// its `refetch_on_focus` / `refetch_on_reconnect` options. Signal-driven
  /// triggers are cache-aware, not forced.
  pub fn attach_signals(&mut self, signals: &RefreshSignals) {
    if self.inner.opts.refetch_on_focus {
      self
        .listeners
        .push(Self::spawn_listener(&self.inner, signals.subscribe_focus()));
    }
    if self.inner.opts.refetch_on_reconnect {
      self
        .listeners
        .push(Self::spawn_listener(&self.inner, signals.subscribe_online()));
    }
  }

  fn spawn_listener(
    inner: &Arc<Inner<T>>,
    mut rx: tokio::sync::broadcast::Receiver<()>,
  ) -> JoinHandle<()> {
    let weak: Weak<Inner<T>> = Arc::downgrade(inner);
    tokio::spawn(async move {
      while rx.recv().await.is_ok() {
        let Some(inner) = weak.upgrade() else { break };
        // Automatic triggers respect the (debounced) enablement flag
        if inner.enabled.load(Ordering::SeqCst) {
          Inner::trigger(&inner, false);
        }
      }
    })
  }

  /// Resolve from cache or issue a network call. `force` bypasses the cache.
  /// Any in-flight attempt is superseded.
  pub fn trigger(&self, force: bool) {
    Inner::trigger(&self.inner, force);
  }

  /// Force a refetch, bypassing the cache, and wait for it to settle.
  pub async fn refetch(&self) {
    Inner::trigger(&self.inner, true);
    self.ready().await;
  }

  /// Update the local value synchronously and write it through to the cache
  /// under the same key. Issues no network call.
  pub fn mutate<F>(&self, updater: F)
  where
    F: FnOnce(Option<T>) -> T,
  {
    let prev = self.data();
    let value = updater(prev);
    if !self.inner.opts.skip_cache {
      self
        .inner
        .cache
        .set(&self.inner.key, &value, self.inner.opts.cache_ttl);
    }
    self.inner.state.send_replace(FetchState::Success(value));
  }

  /// Flip the subscription's enablement. The new value passes through the
  /// configured debounce window before taking effect, so rapid flapping
  /// collapses to a single evaluation.
  pub fn set_enabled(&self, enabled: bool) {
    Inner::set_enabled(&self.inner, enabled);
  }

  /// Wait until the subscription is not `loading`. Returns immediately when
  /// idle, settled, or errored. This is the plain-future adapter for hosts
  /// with a suspending scheduler.
  pub async fn ready(&self) {
    let mut rx = self.inner.state.subscribe();
    loop {
      if !rx.borrow_and_update().is_loading() {
        return;
      }
      if rx.changed().await.is_err() {
        return;
      }
    }
  }

  /// Wait for the next state transition and return the new state.
  pub async fn changed(&self) -> FetchState<T> {
    let mut rx = self.inner.state.subscribe();
    let _ = rx.changed().await;
    let state = rx.borrow().clone();
    state
  }

  pub fn state(&self) -> FetchState<T> {
    self.inner.state.borrow().clone()
  }

  pub fn data(&self) -> Option<T> {
    self.inner.state.borrow().data().cloned()
  }

  pub fn error(&self) -> Option<Arc<ApiError>> {
    match &*self.inner.state.borrow() {
      FetchState::Error(err) => Some(Arc::clone(err)),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.inner.state.borrow().is_loading()
  }

  pub fn cache_key(&self) -> &str {
    &self.inner.key
  }
}

impl<T: FetchValue> Inner<T> {
  fn trigger(self: &Arc<Self>, force: bool) {
    // Supersede: bump the generation so any outstanding attempt's resolution
    // is discarded, then abort its task (best-effort; correctness rests on
    // the generation check, not the abort)
    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    if let Ok(mut current) = self.current.lock() {
      if let Some(handle) = current.take() {
        handle.abort();
      }
    }

    if !force && !self.opts.skip_cache {
      if let Some(value) = self.cache.get::<T>(&self.key) {
        debug!(key = %self.key, "cache hit, serving without network call");
        self.finish_success(value, false);
        return;
      }
    }

    self.state.send_replace(FetchState::Loading);

    let future = (self.fetch)();
    let this = Arc::clone(self);
    let handle = tokio::spawn(async move {
      let result = future.await;
      this.resolve(generation, result);
    });

    if let Ok(mut current) = self.current.lock() {
      *current = Some(handle);
    }
  }

  fn resolve(self: &Arc<Self>, generation: u64, result: Result<T, ApiError>) {
    if self.generation.load(Ordering::SeqCst) != generation {
      debug!(key = %self.key, "discarding superseded attempt");
      return;
    }

    match result {
      Ok(value) => self.finish_success(value, true),
      // Cancellation is not a failure and never changes state
      Err(ApiError::Cancelled { .. }) => {}
      Err(err) => {
        let used = self.retries_used.load(Ordering::SeqCst);
        if used < self.opts.retry_count {
          self.retries_used.store(used + 1, Ordering::SeqCst);
          debug!(key = %self.key, attempt = used + 1, "fetch failed, scheduling retry");

          let this = Arc::clone(self);
          let delay = self.opts.retry_delay;
          let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A trigger issued during the delay supersedes the retry
            if this.generation.load(Ordering::SeqCst) == generation {
              Inner::trigger(&this, true);
            }
          });
          if let Ok(mut current) = self.current.lock() {
            *current = Some(handle);
          }
        } else {
          let err = Arc::new(err);
          self.state.send_replace(FetchState::Error(Arc::clone(&err)));
          if let Some(callback) = &self.opts.on_error {
            callback(&err);
          }
        }
      }
    }
  }

  fn finish_success(&self, value: T, write_through: bool) {
    if write_through && !self.opts.skip_cache {
      self.cache.set(&self.key, &value, self.opts.cache_ttl);
    }
    self.retries_used.store(0, Ordering::SeqCst);
    self.state.send_replace(FetchState::Success(value.clone()));
    if let Some(callback) = &self.opts.on_success {
      callback(&value);
    }
  }

  fn set_enabled(self: &Arc<Self>, enabled: bool) {
    let this = Arc::clone(self);
    let debounce = self.opts.debounce;
    let handle = tokio::spawn(async move {
      tokio::time::sleep(debounce).await;
      this.enabled.store(enabled, Ordering::SeqCst);
      if enabled {
        Inner::trigger(&this, false);
      } else {
        // Disabling supersedes any in-flight attempt but keeps settled state
        this.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut current) = this.current.lock() {
          if let Some(handle) = current.take() {
            handle.abort();
          }
        }
      }
    });

    // Rapid flapping: only the most recent evaluation survives the window
    if let Ok(mut pending) = self.pending_enable.lock() {
      if let Some(previous) = pending.replace(handle) {
        previous.abort();
      }
    }
  }
}

impl<T: FetchValue> Drop for Fetcher<T> {
  fn drop(&mut self) {
    // Teardown cancels the in-flight attempt and all listener tasks
    self.inner.generation.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut current) = self.inner.current.lock() {
      if let Some(handle) = current.take() {
        handle.abort();
      }
    }
    if let Ok(mut pending) = self.inner.pending_enable.lock() {
      if let Some(handle) = pending.take() {
        handle.abort();
      }
    }
    for listener in &self.listeners {
      listener.abort();
    }
  }
}

impl<T: FetchValue> std::fmt::Debug for Fetcher<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Fetcher")
      .field("key", &self.inner.key)
      .field("generation", &self.inner.generation.load(Ordering::SeqCst))
      .finish_non_exhaustive()
  }
}
