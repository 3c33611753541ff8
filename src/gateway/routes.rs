//! Request classification.

use chrono::Duration;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::Strategy;

/// File extensions served as near-static assets.
const ASSET_EXTENSIONS: &[&str] = &[
  "js", "mjs", "css", "map", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "woff",
  "woff2", "ttf", "otf", "mp3", "ogg", "wav", "mp4", "webm",
];

const ASSET_PREFIXES: &[&str] = &["/static/", "/assets/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
  StaticAsset,
  ApiRead,
  Navigation,
  ApiWrite,
  /// HEAD, OPTIONS: forwarded as-is, never cached or queued
  Passthrough,
}

impl ResourceClass {
  /// Strategy for read classes; `None` for anything that bypasses the cache.
  pub fn default_strategy(self) -> Option<Strategy> {
    match self {
      Self::StaticAsset => Some(Strategy::CacheFirst),
      Self::ApiRead => Some(Strategy::NetworkFirst),
      Self::Navigation => Some(Strategy::StaleWhileRevalidate),
      Self::ApiWrite | Self::Passthrough => None,
    }
  }

  pub fn default_max_age(self) -> Duration {
    match self {
      Self::StaticAsset => Duration::days(30),
      Self::ApiRead => Duration::minutes(5),
      Self::Navigation => Duration::days(1),
      Self::ApiWrite | Self::Passthrough => Duration::zero(),
    }
  }

  pub fn is_read(self) -> bool {
    self.default_strategy().is_some()
  }
}

impl std::fmt::Display for ResourceClass {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::StaticAsset => "static-asset",
      Self::ApiRead => "api-read",
      Self::Navigation => "navigation",
      Self::ApiWrite => "api-write",
      Self::Passthrough => "passthrough",
    })
  }
}

/// How one request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
  pub class: ResourceClass,
  pub strategy: Option<Strategy>,
  pub max_age: Duration,
}

impl Route {
  fn for_class(class: ResourceClass) -> Self {
    Self {
      class,
      strategy: class.default_strategy(),
      max_age: class.default_max_age(),
    }
  }
}

/// A configured classification rule, checked before the built-in table.
///
/// Every condition that is set must match. Read classes only ever apply to GET.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteRule {
  /// Methods this rule covers; empty means GET only
  #[serde(default)]
  pub methods: Vec<String>,
  #[serde(default)]
  pub path_prefix: Option<String>,
  /// Extensions without the dot
  #[serde(default)]
  pub extensions: Vec<String>,
  pub class: ResourceClass,
  #[serde(default)]
  pub strategy: Option<Strategy>,
  #[serde(default)]
  pub max_age_ms: Option<i64>,
}

impl RouteRule {
  fn matches(&self, method: &Method, url: &Url) -> bool {
    let method_ok = if self.methods.is_empty() {
      method == Method::GET
    } else {
      self
        .methods
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method.as_str()))
    };
    if !method_ok || (self.class.is_read() && method != Method::GET) {
      return false;
    }

    if let Some(prefix) = &self.path_prefix {
      if !url.path().starts_with(prefix.as_str()) {
        return false;
      }
    }

    if !self.extensions.is_empty() {
      return extension_of(url)
        .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
    }

    true
  }

  fn route(&self) -> Route {
    let mut route = Route::for_class(self.class);
    if route.strategy.is_some() {
      if let Some(strategy) = self.strategy {
        route.strategy = Some(strategy);
      }
    }
    if let Some(ms) = self.max_age_ms {
      route.max_age = Duration::milliseconds(ms.max(0));
    }
    route
  }
}

/// Ordered configured rules in front of the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
  rules: Vec<RouteRule>,
}

impl RouteTable {
  pub fn new(rules: Vec<RouteRule>) -> Self {
    Self { rules }
  }

  /// Classify a request. Pure: the same input always yields the same route.
  pub fn classify(&self, method: &Method, url: &Url) -> Route {
    self
      .rules
      .iter()
      .find(|rule| rule.matches(method, url))
      .map(RouteRule::route)
      .unwrap_or_else(|| Route::for_class(default_class(method, url)))
  }
}

fn default_class(method: &Method, url: &Url) -> ResourceClass {
  if method == Method::HEAD || method == Method::OPTIONS {
    return ResourceClass::Passthrough;
  }
  if method != Method::GET {
    return ResourceClass::ApiWrite;
  }

  let path = url.path();
  let is_asset = ASSET_PREFIXES.iter().any(|p| path.starts_with(p))
    || extension_of(url).is_some_and(|ext| {
      ASSET_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    });

  if is_asset {
    ResourceClass::StaticAsset
  } else if path == "/api" || path.starts_with("/api/") {
    ResourceClass::ApiRead
  } else {
    ResourceClass::Navigation
  }
}

fn extension_of(url: &Url) -> Option<&str> {
  let last = url.path_segments()?.last()?;
  let (stem, ext) = last.rsplit_once('.')?;
  (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}
