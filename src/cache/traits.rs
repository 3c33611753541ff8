//! Core types for the read-through strategies.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How a read reconciles the cache with the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
  /// Network when reachable; bounded-staleness cache otherwise.
  NetworkFirst,
  /// Fresh cache without touching the network; network otherwise.
  CacheFirst,
  /// Whatever is cached right now, refreshed in the background.
  StaleWhileRevalidate,
}

impl std::fmt::Display for Strategy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::NetworkFirst => "network-first",
      Self::CacheFirst => "cache-first",
      Self::StaleWhileRevalidate => "stale-while-revalidate",
    })
  }
}

impl std::str::FromStr for Strategy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "network-first" => Ok(Self::NetworkFirst),
      "cache-first" => Ok(Self::CacheFirst),
      "stale-while-revalidate" | "swr" => Ok(Self::StaleWhileRevalidate),
      other => Err(format!("unknown strategy: {}", other)),
    }
  }
}

/// Per-call knobs for a strategy.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
  /// Freshness window
  pub max_age: Duration,
  /// Skip the network attempt entirely; treated as a network failure.
  pub offline: bool,
}

impl FetchOptions {
  pub fn new(max_age: Duration) -> Self {
    Self {
      max_age,
      offline: false,
    }
  }

  pub fn offline(mut self, offline: bool) -> Self {
    self.offline = offline;
    self
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was stored in the cache
  pub stored_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, stored_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      stored_at: Some(stored_at),
    }
  }

  /// Network confirmed the cached copy is current (304).
  pub fn revalidated(data: T, stored_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Revalidated,
      stored_at: Some(stored_at),
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, stored_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      stored_at: Some(stored_at),
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, stored_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      stored_at: Some(stored_at),
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Cached data the network confirmed unchanged
  Revalidated,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache past its freshness window
  CacheStale,
  /// Network unavailable, serving cached data within its freshness window
  Offline,
}
