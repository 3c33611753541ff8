//! Offline write queue and the coordinator that replays it.

mod coordinator;
mod mutation;
mod policy;
mod queue;
mod result;

pub use coordinator::{SyncCoordinator, SyncState, SyncTrigger};
pub use mutation::{PendingMutation, IDEMPOTENCY_HEADER};
pub use policy::{Attempt, Decision, RetryPolicy};
pub use queue::{MutationQueue, Overflow};
pub use result::{FailureKind, SyncFailure, SyncResult};
