//! Shared bearer-token handle.

use std::sync::{Arc, RwLock};

/// Shared credential handle passed to [`crate::client::ApiClient`].
///
/// The token is owned by the application's composition root and mutated only
/// on login/logout; clones share the same underlying slot.
#[derive(Clone, Default)]
pub struct AuthToken {
  inner: Arc<RwLock<Option<String>>>,
}

impl AuthToken {
  /// Create a handle holding the given token.
  pub fn new(token: Option<String>) -> Self {
    Self {
      inner: Arc::new(RwLock::new(token)),
    }
  }

  /// Replace the token. `None` clears it (logout).
  pub fn set(&self, token: Option<String>) {
    if let Ok(mut slot) = self.inner.write() {
      *slot = token;
    }
  }

  /// Current token, if any.
  pub fn get(&self) -> Option<String> {
    self.inner.read().ok().and_then(|slot| slot.clone())
  }
}

impl std::fmt::Debug for AuthToken {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    // Never print the credential itself
    let present = self.get().is_some();
    f.debug_struct("AuthToken").field("set", &present).finish()
  }
}
