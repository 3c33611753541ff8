//! Error types for the cache and sync engine.

use crate::cache::Payload;

/// Failures of the durable store itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("store lock poisoned: {0}")]
  LockPoisoned(String),

  #[error("failed to prepare store directory {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("corrupt record {key} in {partition}: {source}")]
  Corrupt {
    partition: &'static str,
    key: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Failures to reach the remote at all. HTTP error statuses are not transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
  #[error("request to {url} timed out")]
  Timeout { url: String },

  #[error("could not connect to {url}: {message}")]
  Connect { url: String, message: String },

  #[error("request to {url} failed: {message}")]
  Request { url: String, message: String },
}

/// Top-level error for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The durable store could not be read or written.
  #[error("storage unavailable: {0}")]
  Storage(#[from] StoreError),

  /// The remote could not be reached.
  #[error("network unavailable: {0}")]
  Network(#[from] TransportError),

  /// The remote answered, but not with success.
  #[error("remote responded with status {status}")]
  Status { status: u16, payload: Payload },

  /// The mutation queue is at capacity and the overflow policy rejects new writes.
  #[error("mutation queue is full ({capacity} pending)")]
  QueueFull { capacity: usize },

  /// The request could not be interpreted (bad URL, bad method).
  #[error("invalid request: {message}")]
  InvalidRequest { message: String },

  #[error("serialization failed: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl From<url::ParseError> for Error {
  fn from(err: url::ParseError) -> Self {
    Self::InvalidRequest {
      message: err.to_string(),
    }
  }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type Result<T, E = Error> = std::result::Result<T, E>;
