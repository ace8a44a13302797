//! Best-effort request lifecycle observers.
//!
//! Hooks are an injected, ordered list rather than a global registry. They
//! are invoked in registration order and each one's failure is logged and
//! swallowed: a broken observer can neither block the request nor affect
//! another observer.

use async_trait::async_trait;
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Context passed to `before_request`.
#[derive(Debug, Clone)]
pub struct RequestContext {
  pub method: reqwest::Method,
  pub url: String,
}

/// Context passed to `after_response`. Only produced when a response was
/// actually received, never on transport failure.
#[derive(Debug, Clone)]
pub struct ResponseContext {
  pub method: reqwest::Method,
  pub url: String,
  pub status: u16,
  /// Which attempt produced this response (0-based).
  pub attempt: u32,
  pub elapsed: Duration,
}

/// A request lifecycle observer. Both methods default to no-ops so an
/// implementor can override just one.
#[async_trait]
pub trait RequestHook: Send + Sync {
  async fn before_request(&self, _ctx: &RequestContext) -> Result<()> {
    Ok(())
  }

  async fn after_response(&self, _ctx: &ResponseContext) -> Result<()> {
    Ok(())
  }
}

pub(crate) async fn run_before(hooks: &[Arc<dyn RequestHook>], ctx: &RequestContext) {
  for hook in hooks {
    if let Err(err) = hook.before_request(ctx).await {
      warn!(url = %ctx.url, %err, "before-request hook failed, ignoring");
    }
  }
}

pub(crate) async fn run_after(hooks: &[Arc<dyn RequestHook>], ctx: &ResponseContext) {
  for hook in hooks {
    if let Err(err) = hook.after_response(ctx).await {
      warn!(url = %ctx.url, status = ctx.status, %err, "after-response hook failed, ignoring");
    }
  }
}
