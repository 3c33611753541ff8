//! Canonical request identity.

use reqwest::Method;
use sha2::{Digest, Sha256};
use url::Url;

/// Identity of a request for caching purposes: method plus normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
  identity: String,
}

impl RequestKey {
  pub fn new(method: &Method, url: &Url) -> Self {
    Self {
      identity: format!("{} {}", method.as_str(), normalize_url(url)),
    }
  }

  /// Rebuild a key from an identity previously produced by [`RequestKey::identity`].
  pub(crate) fn from_identity(identity: &str) -> Self {
    Self {
      identity: identity.to_string(),
    }
  }

  /// Human-readable identity, e.g. `GET https://api.example.com/dashboard?a=1`.
  pub fn identity(&self) -> &str {
    &self.identity
  }

  /// Stable, fixed-length key for the store.
  pub fn storage_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.identity.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl std::fmt::Display for RequestKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.identity)
  }
}

/// Normalize a URL so equivalent requests share a cache entry.
///
/// Scheme and host casing and default ports are already canonical in `Url`;
/// on top of that the fragment is dropped and query pairs are sorted.
pub fn normalize_url(url: &Url) -> Url {
  let mut url = url.clone();
  url.set_fragment(None);

  let mut pairs: Vec<(String, String)> = url
    .query_pairs()
    .map(|(k, v)| (k.into_owned(), v.into_owned()))
    .collect();

  if pairs.is_empty() {
    url.set_query(None);
  } else {
    pairs.sort();
    url.query_pairs_mut().clear().extend_pairs(pairs);
  }

  url
}

/// The logical resource a request targets: normalized URL without the query.
///
/// Queued mutations sharing a resource are replayed in creation order.
pub fn resource_of(url: &Url) -> String {
  let mut url = normalize_url(url);
  url.set_query(None);
  url.to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn test_equivalent_urls_share_identity() {
    let a = RequestKey::new(&Method::GET, &url("HTTPS://Api.Example.com:443/dashboard?b=2&a=1#top"));
    let b = RequestKey::new(&Method::GET, &url("https://api.example.com/dashboard?a=1&b=2"));
    assert_eq!(a, b);
    assert_eq!(a.storage_key(), b.storage_key());
    assert_eq!(a.identity(), "GET https://api.example.com/dashboard?a=1&b=2");
  }

  #[test]
  fn test_method_is_part_of_identity() {
    let u = url("https://api.example.com/profile");
    assert_ne!(
      RequestKey::new(&Method::GET, &u).storage_key(),
      RequestKey::new(&Method::HEAD, &u).storage_key()
    );
  }

  #[test]
  fn test_empty_query_is_dropped() {
    assert_eq!(
      normalize_url(&url("https://api.example.com/x?")).as_str(),
      "https://api.example.com/x"
    );
  }

  #[test]
  fn test_resource_ignores_query() {
    assert_eq!(
      resource_of(&url("https://api.example.com/profile?draft=1")),
      "https://api.example.com/profile"
    );
  }
}
