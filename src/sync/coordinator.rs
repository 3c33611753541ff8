//! Drains the mutation queue against the remote.
//!
//! # Lifecycle
//!
//! ```text
//! Idle → Draining → Idle
//! ```
//!
//! Each trigger (connectivity restored, manual "retry now", periodic tick)
//! asks for a drain. A trigger that arrives mid-drain is coalesced. A drain
//! replays mutations one at a time in creation order and is never interrupted
//! between a remote acknowledgment and the local delete.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::mutation::PendingMutation;
use super::policy::{Attempt, Decision, RetryPolicy};
use super::queue::MutationQueue;
use super::result::{FailureKind, SyncResult};
use crate::db::Store;
use crate::error::Result;
use crate::net::{ConnectivityWatch, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
  Idle,
  Draining,
}

/// What a trigger led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "trigger", content = "result", rename_all = "lowercase")]
pub enum SyncTrigger {
  /// A drain ran to completion.
  Completed(SyncResult),
  /// A drain was already running; this trigger was absorbed by it.
  Coalesced,
  /// Connectivity is down; nothing was attempted.
  Offline,
}

enum Delivery {
  Delivered,
  Abandoned(String),
  Deferred { reason: String, unreachable: bool },
}

/// Resets the state to `Idle` however the drain ends.
struct DrainGuard<'a>(&'a watch::Sender<SyncState>);

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.0.send_replace(SyncState::Idle);
  }
}

pub struct SyncCoordinator<S: Store, T: Transport> {
  queue: MutationQueue<S>,
  transport: Arc<T>,
  policy: RetryPolicy,
  connectivity: ConnectivityWatch,
  state: watch::Sender<SyncState>,
  last_result: watch::Sender<Option<SyncResult>>,
}

impl<S: Store, T: Transport> SyncCoordinator<S, T> {
  pub fn new(
    queue: MutationQueue<S>,
    transport: Arc<T>,
    policy: RetryPolicy,
    connectivity: ConnectivityWatch,
  ) -> Self {
    let (state, _) = watch::channel(SyncState::Idle);
    let (last_result, _) = watch::channel(None);
    Self {
      queue,
      transport,
      policy,
      connectivity,
      state,
      last_result,
    }
  }

  /// Run a drain now unless one is already running or the network is down.
  pub async fn sync_now(&self) -> Result<SyncTrigger> {
    if !self.connectivity.is_online() {
      debug!("sync requested while offline");
      return Ok(SyncTrigger::Offline);
    }

    let acquired = self.state.send_if_modified(|state| {
      if *state == SyncState::Draining {
        return false;
      }
      *state = SyncState::Draining;
      true
    });
    if !acquired {
      debug!("sync already draining, coalescing trigger");
      return Ok(SyncTrigger::Coalesced);
    }
    let _guard = DrainGuard(&self.state);

    let result = self.drain().await?;
    self.last_result.send_replace(Some(result.clone()));
    Ok(SyncTrigger::Completed(result))
  }

  /// Whether any mutation is waiting for delivery.
  pub async fn is_sync_needed(&self) -> Result<bool> {
    Ok(!self.queue.is_empty().await?)
  }

  pub async fn pending_count(&self) -> Result<usize> {
    self.queue.len().await
  }

  pub fn state(&self) -> SyncState {
    *self.state.borrow()
  }

  pub fn last_result(&self) -> Option<SyncResult> {
    self.last_result.borrow().clone()
  }

  /// Observe every completed drain.
  pub fn subscribe_results(&self) -> watch::Receiver<Option<SyncResult>> {
    self.last_result.subscribe()
  }

  async fn drain(&self) -> Result<SyncResult> {
    let (mutations, corrupt) = self.queue.load().await?;
    let mut result = SyncResult::new(mutations.len() + corrupt.len());

    // Undecodable records can never be replayed
    for key in corrupt {
      if let Err(err) = self.queue.remove(&key).await {
        warn!(key = %key, error = %err, "corrupt mutation could not be removed");
      }
      result.record_failure(&key, "corrupt record", FailureKind::Abandoned);
    }
    if mutations.is_empty() {
      return Ok(result);
    }
    info!(total = result.total, "sync started");

    // Resources with a deferred mutation; later writes to them must wait
    let mut blocked: HashSet<String> = HashSet::new();
    let mut unreachable = false;

    for mut mutation in mutations {
      let resource = mutation.resource();

      if unreachable {
        result.record_failure(&mutation.id, "network unreachable", FailureKind::Deferred);
        continue;
      }
      if blocked.contains(&resource) {
        result.record_failure(
          &mutation.id,
          "waiting on an earlier mutation for the same resource",
          FailureKind::Deferred,
        );
        continue;
      }

      match self.deliver(&mut mutation).await {
        Delivery::Delivered => {
          // Only after the remote acknowledged it
          if let Err(err) = self.queue.remove(&mutation.id).await {
            warn!(id = %mutation.id, error = %err, "delivered mutation could not be removed");
          }
          result.record_success();
        }
        Delivery::Abandoned(reason) => {
          warn!(id = %mutation.id, endpoint = %mutation.endpoint, reason = %reason, "abandoning mutation");
          if let Err(err) = self.queue.remove(&mutation.id).await {
            warn!(id = %mutation.id, error = %err, "abandoned mutation could not be removed");
          }
          result.record_failure(&mutation.id, reason, FailureKind::Abandoned);
        }
        Delivery::Deferred {
          reason,
          unreachable: network_down,
        } => {
          warn!(
            id = %mutation.id,
            retry_count = mutation.retry_count,
            reason = %reason,
            "mutation deferred to next sync"
          );
          if let Err(err) = self.queue.record_attempts(&mutation).await {
            warn!(id = %mutation.id, error = %err, "failed to persist retry count");
          }
          blocked.insert(resource);
          unreachable = network_down;
          result.record_failure(&mutation.id, reason, FailureKind::Deferred);
        }
      }
    }

    info!(
      total = result.total,
      succeeded = result.succeeded,
      failed = result.failed,
      "sync finished"
    );
    Ok(result)
  }

  /// Try one mutation up to the policy's attempt limit.
  async fn deliver(&self, mutation: &mut PendingMutation) -> Delivery {
    let request = match mutation.to_request() {
      Ok(request) => request,
      Err(err) => return Delivery::Abandoned(err.to_string()),
    };

    let mut attempt = 0;
    loop {
      attempt += 1;
      let outcome = match self.transport.send(&request).await {
        Ok(response) => Attempt::Status(response.status),
        Err(err) => Attempt::Unreachable(err.to_string()),
      };

      match self.policy.decide(&outcome, attempt) {
        Decision::Succeed => {
          debug!(id = %mutation.id, attempt, "mutation delivered");
          return Delivery::Delivered;
        }
        Decision::Abandon { reason } => return Delivery::Abandoned(reason),
        Decision::Retry { delay } => {
          mutation.retry_count += 1;
          warn!(
            id = %mutation.id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            outcome = ?outcome,
            "retrying mutation"
          );
          tokio::time::sleep(delay).await;
        }
        Decision::Defer { reason } => {
          mutation.retry_count += 1;
          return Delivery::Deferred {
            reason,
            unreachable: matches!(outcome, Attempt::Unreachable(_)),
          };
        }
      }
    }
  }
}
