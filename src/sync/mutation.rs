use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::cache::resource_of;
use crate::error::{Error, Result};
use crate::net::Request;

/// Header the remote can use to drop a replay it has already applied.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// A write that has not yet been acknowledged by the remote.
///
/// Only `retry_count` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
  /// UUIDv7, so ids sort roughly by creation time
  pub id: String,
  pub endpoint: String,
  pub method: String,
  #[serde(default)]
  pub body: Value,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub retry_count: u32,
}

impl PendingMutation {
  pub fn new(method: &Method, endpoint: &Url, body: Option<Value>, created_at: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::now_v7().to_string(),
      endpoint: endpoint.to_string(),
      method: method.as_str().to_string(),
      body: body.unwrap_or(Value::Null),
      created_at,
      retry_count: 0,
    }
  }

  /// Logical resource this write targets; writes to one resource replay in order.
  pub fn resource(&self) -> String {
    Url::parse(&self.endpoint)
      .map(|url| resource_of(&url))
      .unwrap_or_else(|_| self.endpoint.clone())
  }

  /// The request to replay, tagged with this mutation's id.
  pub fn to_request(&self) -> Result<Request> {
    let method = Method::from_bytes(self.method.as_bytes()).map_err(|e| Error::InvalidRequest {
      message: format!("invalid method {:?}: {}", self.method, e),
    })?;
    let url = Url::parse(&self.endpoint)?;

    let mut request = Request::new(method, url).with_header(IDEMPOTENCY_HEADER, self.id.as_str());
    if !self.body.is_null() {
      request = request.with_body(self.body.clone());
    }
    Ok(request)
  }
}
