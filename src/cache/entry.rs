//! Cached responses and their payloads.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A response body, kept as structured JSON when possible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Payload {
  Json(Value),
  Text(String),
  Binary(#[serde(with = "hex_bytes")] Vec<u8>),
}

impl Payload {
  /// Decode a body using its content type as a hint.
  pub fn from_bytes(content_type: Option<&str>, bytes: &[u8]) -> Self {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let json_hinted = content_type.contains("json") || content_type.is_empty();

    if json_hinted {
      if let Ok(value) = serde_json::from_slice(bytes) {
        return Self::Json(value);
      }
    }

    let texty = content_type.is_empty()
      || content_type.starts_with("text/")
      || content_type.contains("json")
      || content_type.contains("xml")
      || content_type.contains("javascript");

    match std::str::from_utf8(bytes) {
      Ok(text) if texty => Self::Text(text.to_string()),
      _ => Self::Binary(bytes.to_vec()),
    }
  }
}

/// A cached GET response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  /// Canonical request identity (method + normalized URL)
  pub key: String,
  pub payload: Payload,
  pub stored_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub etag: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_type: Option<String>,
}

impl CacheEntry {
  pub fn age(&self, now: DateTime<Utc>) -> Duration {
    now - self.stored_at
  }

  /// Strictly younger than `max_age`.
  pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
    self.age(now) < max_age
  }
}

mod hex_bytes {
  use serde::{de::Error, Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    hex::decode(s).map_err(D::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_payload_from_json_body() {
    let payload = Payload::from_bytes(Some("application/json; charset=utf-8"), br#"{"a":1}"#);
    assert_eq!(payload, Payload::Json(json!({"a": 1})));
  }

  #[test]
  fn test_payload_from_html_and_binary() {
    let html = Payload::from_bytes(Some("text/html"), b"<p>hi</p>");
    assert_eq!(html, Payload::Text("<p>hi</p>".to_string()));

    let png = Payload::from_bytes(Some("image/png"), &[0x89, 0x50, 0x4e, 0x47]);
    assert_eq!(png, Payload::Binary(vec![0x89, 0x50, 0x4e, 0x47]));
  }

  #[test]
  fn test_binary_payload_survives_storage_encoding() {
    let entry = CacheEntry {
      key: "GET https://example.com/logo.png".to_string(),
      payload: Payload::Binary(vec![0, 255, 7]),
      stored_at: Utc::now(),
      etag: None,
      content_type: Some("image/png".to_string()),
    };

    let encoded = serde_json::to_vec(&entry).unwrap();
    assert!(String::from_utf8_lossy(&encoded).contains("00ff07"));
    let decoded: CacheEntry = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(decoded, entry);
  }

  #[test]
  fn test_freshness_boundary_is_exclusive() {
    let now = Utc::now();
    let entry = CacheEntry {
      key: "k".to_string(),
      payload: Payload::Text(String::new()),
      stored_at: now - Duration::minutes(5),
      etag: None,
      content_type: None,
    };
    assert!(!entry.is_fresh(now, Duration::minutes(5)));
    assert!(entry.is_fresh(now, Duration::minutes(6)));
  }
}
