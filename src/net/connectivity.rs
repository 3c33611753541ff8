//! Process-wide online/offline signal.
//!
//! There is exactly one [`ConnectivityPublisher`] (held by whatever listens to
//! the platform) and any number of [`ConnectivityWatch`] readers. Readers
//! cannot write, and the publisher is not `Clone`.

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
  pub is_online: bool,
}

/// Create the broadcast, seeded with the platform's current reachability.
pub fn channel(initially_online: bool) -> (ConnectivityPublisher, ConnectivityWatch) {
  let (tx, rx) = watch::channel(ConnectivityState {
    is_online: initially_online,
  });
  (ConnectivityPublisher { tx }, ConnectivityWatch { rx })
}

/// The single writer of the connectivity state.
#[derive(Debug)]
pub struct ConnectivityPublisher {
  tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityPublisher {
  /// Record the latest observation. Returns `true` on an actual transition.
  pub fn set_online(&self, online: bool) -> bool {
    let changed = self.tx.send_if_modified(|state| {
      if state.is_online == online {
        return false;
      }
      state.is_online = online;
      true
    });
    if changed {
      info!(online, "connectivity changed");
    }
    changed
  }

  pub fn subscribe(&self) -> ConnectivityWatch {
    ConnectivityWatch {
      rx: self.tx.subscribe(),
    }
  }
}

/// A read-only view of the connectivity state.
#[derive(Debug, Clone)]
pub struct ConnectivityWatch {
  rx: watch::Receiver<ConnectivityState>,
}

impl ConnectivityWatch {
  pub fn is_online(&self) -> bool {
    self.rx.borrow().is_online
  }

  pub fn state(&self) -> ConnectivityState {
    *self.rx.borrow()
  }

  /// Wait for the next transition. Returns `None` once the publisher is gone.
  pub async fn changed(&mut self) -> Option<ConnectivityState> {
    self.rx.changed().await.ok()?;
    Some(*self.rx.borrow_and_update())
  }
}
