//! Subscription state machine.

use std::sync::Arc;

use crate::client::ApiError;

/// The state of a fetch subscription: `idle → loading → {success, error}`,
/// with `success` and `error` returning to `loading` on refetch or retry.
#[derive(Debug, Clone)]
pub enum FetchState<T> {
  /// Not started
  Idle,
  /// A network attempt is in flight (or an internal retry is pending)
  Loading,
  /// Resolved with data, from cache or network
  Success(T),
  /// Both retry budgets exhausted
  Error(Arc<ApiError>),
}

impl<T> FetchState<T> {
  pub fn is_idle(&self) -> bool {
    matches!(self, FetchState::Idle)
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, FetchState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, FetchState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, FetchState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      FetchState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      FetchState::Error(err) => Some(err),
      _ => None,
    }
  }
}
