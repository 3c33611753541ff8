//! What the gateway hands back to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::routes::ResourceClass;
use crate::cache::{CacheSource, Payload};

/// Why a request could not be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnavailableReason {
  /// Network unreachable and nothing usable cached
  Offline,
  /// The durable store failed
  Storage,
  /// The write could not be queued
  QueueFull,
}

/// Synthesized answer for a request that produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfflineResponse {
  /// Always `"unavailable"`
  pub status: &'static str,
  pub reason: UnavailableReason,
  pub message: String,
}

impl OfflineResponse {
  pub fn new(reason: UnavailableReason, message: impl Into<String>) -> Self {
    Self {
      status: "unavailable",
      reason,
      message: message.into(),
    }
  }
}

/// What the gateway hands back for a request. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum GatewayResponse {
  /// A read served through a cache strategy.
  Data {
    payload: Payload,
    source: CacheSource,
    stored_at: Option<DateTime<Utc>>,
    class: ResourceClass,
  },
  /// The remote answered directly: a non-2xx read, a direct write, a passthrough.
  Upstream { status: u16, payload: Payload },
  /// The write was accepted locally and will be delivered by the next sync.
  Queued { mutation_id: String, pending: usize },
  Unavailable(OfflineResponse),
}

impl GatewayResponse {
  pub(crate) fn unavailable(reason: UnavailableReason, message: impl Into<String>) -> Self {
    Self::Unavailable(OfflineResponse::new(reason, message))
  }

  /// An HTTP-like status for callers that want one: 202 for queued writes,
  /// 503 for synthesized offline answers.
  pub fn status(&self) -> u16 {
    match self {
      Self::Data { .. } => 200,
      Self::Upstream { status, .. } => *status,
      Self::Queued { .. } => 202,
      Self::Unavailable(_) => 503,
    }
  }

  pub fn payload(&self) -> Option<&Payload> {
    match self {
      Self::Data { payload, .. } | Self::Upstream { payload, .. } => Some(payload),
      _ => None,
    }
  }

  pub fn is_queued(&self) -> bool {
    matches!(self, Self::Queued { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_offline_response_shape() {
    let response = GatewayResponse::unavailable(UnavailableReason::QueueFull, "queue is full");

    assert_eq!(
      serde_json::to_value(&response).unwrap(),
      json!({
        "outcome": "unavailable",
        "status": "unavailable",
        "reason": "queue-full",
        "message": "queue is full"
      })
    );
    assert_eq!(response.status(), 503);
  }
}
