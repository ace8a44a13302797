//! Client-side data fetching and caching for dashboard applications.
//!
//! Three pieces, composed bottom-up:
//!
//! - [`cache::MemoryCache`] — in-memory key/value store with per-entry TTL,
//!   a capacity bound with insertion-order eviction, and pattern invalidation.
//! - [`client::ApiClient`] — HTTP client with base-URL resolution, bearer-token
//!   injection, per-attempt timeouts, exponential-backoff retries, and a typed
//!   error taxonomy ([`client::ApiError`]).
//! - [`fetch::Fetcher`] — per-subscription coordinator that resolves from cache
//!   or network, supersedes stale in-flight attempts, applies its own retry
//!   budget on top of the client's, and supports mutation, debounced
//!   enablement, and focus/reconnect refresh triggers.
//!
//! # Example
//!
//! ```ignore
//! let cache = Arc::new(MemoryCache::new(200, Duration::from_secs(30)));
//! let client = ApiClient::new(&config, AuthToken::default())?;
//!
//! let fetcher = Fetcher::new(
//!   cache.clone(),
//!   "api:GET:/widgets",
//!   FetchOptions::default().with_cache_ttl(Duration::from_secs(5)),
//!   move || {
//!     let client = client.clone();
//!     async move { client.get_json::<Vec<Widget>>("/widgets").await }
//!   },
//! );
//!
//! fetcher.trigger(false);
//! fetcher.ready().await;
//! if let Some(widgets) = fetcher.data() {
//!   render(widgets);
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod fetch;

pub use auth::AuthToken;
pub use cache::{CacheStats, MemoryCache};
pub use client::{ApiClient, ApiError, RequestHook, RequestOptions};
pub use config::DataLayerConfig;
pub use fetch::{FetchOptions, FetchState, Fetcher, RefreshSignals};
