//! Retry decisions, kept free of I/O.

use std::time::Duration;

/// What one delivery attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
  /// The remote answered with this status.
  Status(u16),
  /// No answer at all: timeout, refused connection, DNS.
  Unreachable(String),
}

/// What to do after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  /// Acknowledged; delete the mutation.
  Succeed,
  /// Try again after `delay`, within this run.
  Retry { delay: Duration },
  /// The remote will never accept this; drop it and report.
  Abandon { reason: String },
  /// Out of attempts for this run; keep it queued for the next one.
  Defer { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Attempts per mutation per run
  pub max_retries: u32,
  /// Delay unit; the wait after attempt `n` is `base_delay * n`
  pub base_delay: Duration,
  /// 4xx statuses treated as transient
  pub transient_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      base_delay: Duration::from_secs(1),
      transient_statuses: vec![408, 429],
    }
  }
}

impl RetryPolicy {
  /// Decide the fate of a mutation after its `attempt`-th try in this run (1-based).
  pub fn decide(&self, outcome: &Attempt, attempt: u32) -> Decision {
    let reason = match outcome {
      Attempt::Status(status) if (200..300).contains(status) => return Decision::Succeed,
      Attempt::Status(status) if self.is_permanent(*status) => {
        return Decision::Abandon {
          reason: format!("rejected with status {}", status),
        };
      }
      Attempt::Status(status) => format!("remote answered {}", status),
      Attempt::Unreachable(message) => message.clone(),
    };

    if attempt < self.max_retries {
      Decision::Retry {
        delay: self.delay_after(attempt),
      }
    } else {
      Decision::Defer {
        reason: format!("{} after {} attempts", reason, attempt),
      }
    }
  }

  /// Linear backoff: `base_delay × attempt`.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    self.base_delay * attempt
  }

  /// Anything below 500 that is neither success nor listed as transient.
  fn is_permanent(&self, status: u16) -> bool {
    status < 500 && !self.transient_statuses.contains(&status)
  }
}
