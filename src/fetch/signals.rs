//! Host environment refresh signals.
//!
//! The host application owns a [`RefreshSignals`] and forwards its own
//! window-focus and network-reconnect events into it; subscriptions that
//! opted in re-trigger (cache-aware, not forced) on each signal.

use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct RefreshSignals {
  focus: broadcast::Sender<()>,
  online: broadcast::Sender<()>,
}

impl RefreshSignals {
  pub fn new() -> Self {
    let (focus, _) = broadcast::channel(16);
    let (online, _) = broadcast::channel(16);
    Self { focus, online }
  }

  /// The window regained focus.
  pub fn emit_focus(&self) {
    let _ = self.focus.send(());
  }

  /// Network connectivity came back.
  pub fn emit_online(&self) {
    let _ = self.online.send(());
  }

  pub fn subscribe_focus(&self) -> broadcast::Receiver<()> {
    self.focus.subscribe()
  }

  pub fn subscribe_online(&self) -> broadcast::Receiver<()> {
    self.online.subscribe()
  }
}

impl Default for RefreshSignals {
  fn default() -> Self {
    Self::new()
  }
}
