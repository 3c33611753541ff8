use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::db::Store;
use crate::net::{ConnectivityState, ConnectivityWatch, Transport};
use crate::sync::{SyncCoordinator, SyncTrigger};

/// Things that may warrant a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// Connectivity transitioned
  Connectivity(ConnectivityState),
  /// Someone asked for a sync ("retry now", a write queued while online)
  SyncRequested,
  /// Periodic tick
  Tick,
}

/// Handle for asking the event loop to sync.
#[derive(Debug, Clone)]
pub struct SyncRequester {
  tx: mpsc::UnboundedSender<Event>,
}

impl SyncRequester {
  /// Returns `false` if the event loop is gone.
  pub fn request(&self) -> bool {
    self.tx.send(Event::SyncRequested).is_ok()
  }
}

/// Event handler that merges connectivity transitions, manual requests and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
  tx: mpsc::UnboundedSender<Event>,
  tasks: Vec<JoinHandle<()>>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(connectivity: ConnectivityWatch, tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Forward connectivity transitions
    let forwarder = {
      let tx = tx.clone();
      let mut connectivity = connectivity;
      tokio::spawn(async move {
        while let Some(state) = connectivity.changed().await {
          if tx.send(Event::Connectivity(state)).is_err() {
            break;
          }
        }
      })
    };

    let ticker = {
      let tx = tx.clone();
      tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_rate);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;
        loop {
          interval.tick().await;
          if tx.send(Event::Tick).is_err() {
            break;
          }
        }
      })
    };

    Self {
      rx,
      tx,
      tasks: vec![forwarder, ticker],
    }
  }

  pub fn requester(&self) -> SyncRequester {
    SyncRequester {
      tx: self.tx.clone(),
    }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

impl Drop for EventHandler {
  fn drop(&mut self) {
    for task in &self.tasks {
      task.abort();
    }
  }
}

/// Wake the coordinator on every event that calls for it, until the handler closes.
///
/// Drains run on their own tasks; overlapping triggers are coalesced by the
/// coordinator.
pub async fn run_sync_loop<S: Store, T: Transport>(
  mut events: EventHandler,
  coordinator: Arc<SyncCoordinator<S, T>>,
) {
  while let Some(event) = events.next().await {
    let wanted = match &event {
      Event::Connectivity(state) => state.is_online,
      Event::SyncRequested => true,
      Event::Tick => match coordinator.is_sync_needed().await {
        Ok(needed) => needed,
        Err(err) => {
          warn!(error = %err, "could not check the mutation queue");
          false
        }
      },
    };
    if !wanted {
      continue;
    }

    debug!(?event, "triggering sync");
    let coordinator = Arc::clone(&coordinator);
    tokio::spawn(async move {
      match coordinator.sync_now().await {
        Ok(SyncTrigger::Completed(result)) if result.total > 0 => {
          info!(
            succeeded = result.succeeded,
            failed = result.failed,
            total = result.total,
            "background sync done"
          );
        }
        Ok(_) => {}
        Err(err) => warn!(error = %err, "background sync failed"),
      }
    });
  }
}
