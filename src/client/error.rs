//! Error taxonomy for the request client.

use thiserror::Error;

/// Classified outcome of a failed request.
///
/// Retryability is a property of the class: transport and 5xx failures may be
/// retried, 4xx and parse failures are terminal, and cancellation is not a
/// failure at all (consumers of a superseded attempt discard it silently).
#[derive(Debug, Error)]
pub enum ApiError {
  /// No response was received: DNS, connect, timeout, abort.
  #[error("transport error for {url}: {message}")]
  Transport { url: String, message: String },

  /// 5xx response.
  #[error("server error {status} for {url}")]
  Server {
    status: u16,
    url: String,
    body: Option<String>,
  },

  /// 4xx response. Never retried.
  #[error("client error {status} for {url}")]
  Client {
    status: u16,
    url: String,
    body: Option<String>,
  },

  /// Response body did not match its declared content type.
  #[error("parse error for {url}: {message}")]
  Parse { url: String, message: String },

  /// Attempt was superseded or torn down.
  #[error("request cancelled for {url}")]
  Cancelled { url: String },
}

impl ApiError {
  /// Whether another attempt may produce a different outcome.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Transport { .. } | Self::Server { .. })
  }

  /// HTTP status, when a response was received.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn url(&self) -> &str {
    match self {
      Self::Transport { url, .. }
      | Self::Server { url, .. }
      | Self::Client { url, .. }
      | Self::Parse { url, .. }
      | Self::Cancelled { url } => url,
    }
  }
}
