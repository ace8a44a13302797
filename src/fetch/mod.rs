//! Fetch coordination: per-subscription orchestration of cache lookups,
//! network calls, supersession, retries, and refresh triggers.

mod coordinator;
mod options;
mod signals;
mod state;

pub use coordinator::{derive_cache_key, FetchValue, Fetcher};
pub use options::{ErrorCallback, FetchOptions, SuccessCallback};
pub use signals::RefreshSignals;
pub use state::FetchState;
