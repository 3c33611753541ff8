//! Typed view of the store's mutation partition.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::mutation::PendingMutation;
use crate::db::{Partition, Store};
use crate::error::{Error, Result};

/// What to do when a write arrives and the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Overflow {
  /// Refuse the new write; the caller sees "queue full".
  #[default]
  RejectNew,
  /// Discard the oldest queued write to make room.
  DropOldest,
}

/// FIFO queue of pending mutations shared by the gateway and the coordinator.
pub struct MutationQueue<S: Store> {
  store: Arc<S>,
  capacity: usize,
  overflow: Overflow,
}

impl<S: Store> MutationQueue<S> {
  pub fn new(store: Arc<S>, capacity: usize, overflow: Overflow) -> Self {
    Self {
      store,
      capacity: capacity.max(1),
      overflow,
    }
  }

  /// Append a mutation. Returns the number of pending mutations afterwards.
  pub async fn enqueue(&self, mutation: &PendingMutation) -> Result<usize> {
    let mut pending = self.store.count(Partition::PendingMutations).await?;

    if pending >= self.capacity {
      match self.overflow {
        Overflow::RejectNew => {
          warn!(capacity = self.capacity, id = %mutation.id, "mutation queue full, rejecting write");
          return Err(Error::QueueFull {
            capacity: self.capacity,
          });
        }
        Overflow::DropOldest => {
          let records = self.store.get_all(Partition::PendingMutations).await?;
          for record in records.iter().take(pending + 1 - self.capacity) {
            self.store.delete(Partition::PendingMutations, &record.key).await?;
            pending -= 1;
            warn!(dropped = %record.key, "mutation queue full, dropped oldest mutation");
          }
        }
      }
    }

    let value = serde_json::to_vec(mutation)?;
    self
      .store
      .put(Partition::PendingMutations, &mutation.id, &value)
      .await?;
    debug!(id = %mutation.id, method = %mutation.method, endpoint = %mutation.endpoint, "queued mutation");

    Ok(pending + 1)
  }

  /// All pending mutations in creation order.
  ///
  /// Records that cannot be decoded are left in place and skipped.
  pub async fn pending(&self) -> Result<Vec<PendingMutation>> {
    let (mutations, _) = self.load().await?;
    Ok(mutations)
  }

  /// Decoded mutations in creation order, plus the keys of records that
  /// failed to decode.
  pub(crate) async fn load(&self) -> Result<(Vec<PendingMutation>, Vec<String>)> {
    let records = self.store.get_all(Partition::PendingMutations).await?;

    let mut mutations = Vec::with_capacity(records.len());
    let mut corrupt = Vec::new();
    for record in records {
      match serde_json::from_slice(&record.value) {
        Ok(mutation) => mutations.push(mutation),
        Err(err) => {
          error!(key = %record.key, error = %err, "undecodable pending mutation");
          corrupt.push(record.key);
        }
      }
    }
    Ok((mutations, corrupt))
  }

  /// Persist the mutation's current retry count without moving it in the queue.
  ///
  /// A mutation that left the queue in the meantime (evicted, cleared) is not
  /// written back. Returns whether it was still queued.
  pub async fn record_attempts(&self, mutation: &PendingMutation) -> Result<bool> {
    let value = serde_json::to_vec(mutation)?;
    let updated = self
      .store
      .update(Partition::PendingMutations, &mutation.id, &value)
      .await?;
    if !updated {
      debug!(id = %mutation.id, "mutation left the queue during replay, not restoring it");
    }
    Ok(updated)
  }

  pub async fn remove(&self, id: &str) -> Result<bool> {
    Ok(self.store.delete(Partition::PendingMutations, id).await?)
  }

  pub async fn len(&self) -> Result<usize> {
    Ok(self.store.count(Partition::PendingMutations).await?)
  }

  pub async fn is_empty(&self) -> Result<bool> {
    Ok(self.len().await? == 0)
  }

  /// Whether any queued mutation targets `resource` (see [`PendingMutation::resource`]).
  pub async fn has_pending_for(&self, resource: &str) -> Result<bool> {
    Ok(self.pending().await?.iter().any(|m| m.resource() == resource))
  }

  pub async fn clear(&self) -> Result<usize> {
    Ok(self.store.clear(Partition::PendingMutations).await?)
  }
}

impl<S: Store> Clone for MutationQueue<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      capacity: self.capacity,
      overflow: self.overflow,
    }
  }
}
