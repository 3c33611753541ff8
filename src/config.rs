use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use wellsync::gateway::{RouteRule, RouteTable};
use wellsync::sync::{Overflow, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Extra classification rules, checked in order before the defaults
  #[serde(default)]
  pub routes: Vec<RouteRule>,
  /// Fallback filter when RUST_LOG is unset
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  pub base_url: String,
  /// Per-attempt timeout
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Probed with HEAD to decide online/offline
  #[serde(default = "default_health_path")]
  pub health_path: String,
  #[serde(default = "default_probe_interval_ms")]
  pub probe_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
  /// Database file (defaults to the platform data directory)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  #[serde(default = "default_base_delay_ms")]
  pub base_delay_ms: u64,
  /// 4xx statuses that are retried instead of abandoned
  #[serde(default = "default_transient_statuses")]
  pub transient_statuses: Vec<u16>,
  #[serde(default = "default_queue_capacity")]
  pub queue_capacity: usize,
  #[serde(default)]
  pub overflow: Overflow,
  /// How often `watch` checks for leftover mutations
  #[serde(default = "default_tick_interval_ms")]
  pub tick_interval_ms: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      max_retries: default_max_retries(),
      base_delay_ms: default_base_delay_ms(),
      transient_statuses: default_transient_statuses(),
      queue_capacity: default_queue_capacity(),
      overflow: Overflow::default(),
      tick_interval_ms: default_tick_interval_ms(),
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_health_path() -> String {
  "/health".to_string()
}

fn default_probe_interval_ms() -> u64 {
  30_000
}

fn default_max_retries() -> u32 {
  RetryPolicy::default().max_retries
}

fn default_base_delay_ms() -> u64 {
  1_000
}

fn default_transient_statuses() -> Vec<u16> {
  RetryPolicy::default().transient_statuses
}

fn default_queue_capacity() -> usize {
  1_000
}

fn default_tick_interval_ms() -> u64 {
  60_000
}

impl RemoteConfig {
  pub fn base_url(&self) -> Result<Url> {
    Url::parse(&self.base_url).map_err(|e| eyre!("Invalid remote.base_url {:?}: {}", self.base_url, e))
  }

  pub fn health_url(&self) -> Result<Url> {
    self
      .base_url()?
      .join(&self.health_path)
      .map_err(|e| eyre!("Invalid remote.health_path {:?}: {}", self.health_path, e))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn probe_interval(&self) -> Duration {
    Duration::from_millis(self.probe_interval_ms.max(1))
  }
}

impl SyncConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_retries: self.max_retries.max(1),
      base_delay: Duration::from_millis(self.base_delay_ms),
      transient_statuses: self.transient_statuses.clone(),
    }
  }

  pub fn tick_interval(&self) -> Duration {
    Duration::from_millis(self.tick_interval_ms.max(1))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./wellsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/wellsync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/wellsync/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("wellsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("wellsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  pub fn route_table(&self) -> RouteTable {
    RouteTable::new(self.routes.clone())
  }

  /// Get the API token from the environment, if any.
  ///
  /// Checks WELLSYNC_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("WELLSYNC_API_TOKEN")
      .ok()
      .filter(|token| !token.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wellsync::gateway::ResourceClass;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("remote:\n  base_url: https://api.example.com\n").unwrap();

    assert_eq!(config.remote.timeout(), Duration::from_secs(10));
    assert_eq!(
      config.remote.health_url().unwrap().as_str(),
      "https://api.example.com/health"
    );
    assert_eq!(config.sync.retry_policy(), RetryPolicy::default());
    assert_eq!(config.sync.queue_capacity, 1000);
    assert_eq!(config.sync.overflow, Overflow::RejectNew);
    assert!(config.store.path.is_none());
    assert_eq!(config.log_level, "info");
  }

  #[test]
  fn test_full_config() {
    let config = Config::parse(
      r#"
remote:
  base_url: https://api.example.com/v1/
  timeout_ms: 2500
store:
  path: /tmp/wellsync.db
sync:
  max_retries: 5
  base_delay_ms: 200
  transient_statuses: [409, 429]
  queue_capacity: 50
  overflow: drop-oldest
routes:
  - path_prefix: /v1/feed
    class: navigation
log_level: debug
"#,
    )
    .unwrap();

    let policy = config.sync.retry_policy();
    assert_eq!(policy.max_retries, 5);
    assert_eq!(policy.base_delay, Duration::from_millis(200));
    assert_eq!(policy.transient_statuses, vec![409, 429]);
    assert_eq!(config.sync.overflow, Overflow::DropOldest);
    assert_eq!(config.routes[0].class, ResourceClass::Navigation);
    assert_eq!(config.store.path, Some(PathBuf::from("/tmp/wellsync.db")));
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/wellsync.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
