//! Outcome of one drain of the mutation queue.

use serde::Serialize;

/// How a mutation failed in a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
  /// Rejected by the remote; removed and will not be retried.
  Abandoned,
  /// Still queued; will be retried on the next drain.
  Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
  pub id: String,
  pub reason: String,
  pub kind: FailureKind,
}

/// Summary of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
  pub succeeded: usize,
  pub failed: usize,
  pub total: usize,
  pub errors: Vec<SyncFailure>,
}

impl SyncResult {
  pub(crate) fn new(total: usize) -> Self {
    Self {
      total,
      ..Self::default()
    }
  }

  pub(crate) fn record_success(&mut self) {
    self.succeeded += 1;
  }

  pub(crate) fn record_failure(&mut self, id: &str, reason: impl Into<String>, kind: FailureKind) {
    self.failed += 1;
    self.errors.push(SyncFailure {
      id: id.to_string(),
      reason: reason.into(),
      kind,
    });
  }

  pub fn abandoned(&self) -> usize {
    self.count(FailureKind::Abandoned)
  }

  pub fn deferred(&self) -> usize {
    self.count(FailureKind::Deferred)
  }

  fn count(&self, kind: FailureKind) -> usize {
    self.errors.iter().filter(|e| e.kind == kind).count()
  }
}
