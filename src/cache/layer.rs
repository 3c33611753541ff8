//! Cache layer that orchestrates caching logic with network fetching.

use reqwest::Method;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Url;

use super::entry::{CacheEntry, Payload};
use super::key::RequestKey;
use super::traits::{CacheResult, FetchOptions, Strategy};
use crate::clock::{Clock, SystemClock};
use crate::db::{Partition, Store};
use crate::error::{Error, Result, StoreError};
use crate::net::{if_none_match, Request, Response, Transport};

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the gateway and the transport. It owns the cache
/// partition: nothing else writes to it.
pub struct CacheLayer<S: Store, T: Transport> {
  storage: Arc<S>,
  transport: Arc<T>,
  clock: Arc<dyn Clock>,
  /// Storage keys with a background refresh in flight, shared by clones.
  refreshing: Arc<Mutex<HashSet<String>>>,
}

/// Marks a key as refreshing until dropped.
struct RefreshSlot {
  refreshing: Arc<Mutex<HashSet<String>>>,
  key: String,
}

impl RefreshSlot {
  fn claim(refreshing: &Arc<Mutex<HashSet<String>>>, key: &str) -> Option<Self> {
    let claimed = refreshing
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(key.to_string());
    claimed.then(|| Self {
      refreshing: Arc::clone(refreshing),
      key: key.to_string(),
    })
  }
}

impl Drop for RefreshSlot {
  fn drop(&mut self) {
    self
      .refreshing
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(&self.key);
  }
}

/// Outcome of reading the cache partition, remembering whether storage failed.
struct Lookup {
  entry: Option<CacheEntry>,
  storage_failed: Option<StoreError>,
}

/// "No data" when nothing could be served: storage trouble wins over a plain miss.
fn no_data(storage_failed: Option<StoreError>) -> Result<Option<CacheResult<Payload>>> {
  match storage_failed {
    Some(err) => Err(Error::Storage(err)),
    None => Ok(None),
  }
}

enum NetworkOutcome {
  Fetched(CacheEntry),
  Status(Response),
  Unreachable,
}

impl<S: Store, T: Transport> CacheLayer<S, T> {
  /// Create a new cache layer with the given storage backend and transport.
  pub fn new(storage: Arc<S>, transport: Arc<T>) -> Self {
    Self {
      storage,
      transport,
      clock: Arc::new(SystemClock),
      refreshing: Arc::new(Mutex::new(HashSet::new())),
    }
  }

  /// Use a different clock for freshness decisions and timestamps.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Read `url` through `strategy`.
  ///
  /// `Ok(None)` is "no data": nothing servable exists in the cache and the
  /// network could not be reached. HTTP error statuses surface as
  /// [`Error::Status`] and never touch the cache.
  pub async fn fetch_with_strategy(
    &self,
    url: &Url,
    strategy: Strategy,
    options: &FetchOptions,
  ) -> Result<Option<CacheResult<Payload>>> {
    let key = RequestKey::new(&Method::GET, url);
    debug!(key = %key, %strategy, offline = options.offline, "fetching");

    match strategy {
      Strategy::NetworkFirst => self.network_first(url, &key, options).await,
      Strategy::CacheFirst => self.cache_first(url, &key, options).await,
      Strategy::StaleWhileRevalidate => self.stale_while_revalidate(url, &key, options).await,
    }
  }

  /// Peek at the cached entry for a GET of `url` without any network traffic.
  pub async fn cached(&self, url: &Url) -> Result<Option<CacheEntry>> {
    let key = RequestKey::new(&Method::GET, url);
    Ok(self.read_entry(&key).await?)
  }

  /// Drop the cached entry for a GET of `url`.
  pub async fn invalidate(&self, url: &Url) -> Result<bool> {
    let key = RequestKey::new(&Method::GET, url);
    Ok(
      self
        .storage
        .delete(Partition::Cache, &key.storage_key())
        .await?,
    )
  }

  async fn network_first(
    &self,
    url: &Url,
    key: &RequestKey,
    options: &FetchOptions,
  ) -> Result<Option<CacheResult<Payload>>> {
    let Lookup {
      entry: cached,
      storage_failed,
    } = self.lookup(key).await;

    if !options.offline {
      let etag = cached.as_ref().and_then(|e| e.etag.as_deref());
      match self.fetch_network(url, key, etag).await {
        NetworkOutcome::Fetched(entry) => return Ok(Some(self.store_fetched(entry).await)),
        NetworkOutcome::Status(response) => return self.handle_status(response, cached).await,
        NetworkOutcome::Unreachable => {}
      }
    }

    // Network unavailable: bounded staleness only
    let now = self.clock.now();
    match cached {
      Some(entry) if entry.is_fresh(now, options.max_age) => {
        Ok(Some(CacheResult::offline(entry.payload, entry.stored_at)))
      }
      Some(entry) => {
        debug!(key = %key, age_secs = entry.age(now).num_seconds(), "cached entry too old to serve");
        Ok(None)
      }
      None => no_data(storage_failed),
    }
  }

  async fn cache_first(
    &self,
    url: &Url,
    key: &RequestKey,
    options: &FetchOptions,
  ) -> Result<Option<CacheResult<Payload>>> {
    let Lookup {
      entry: cached,
      storage_failed,
    } = self.lookup(key).await;
    let now = self.clock.now();

    if let Some(entry) = &cached {
      if entry.is_fresh(now, options.max_age) {
        // Cache is fresh, return immediately
        return Ok(Some(CacheResult::from_cache(
          entry.payload.clone(),
          entry.stored_at,
          false,
        )));
      }
    }

    if !options.offline {
      let etag = cached.as_ref().and_then(|e| e.etag.as_deref());
      match self.fetch_network(url, key, etag).await {
        NetworkOutcome::Fetched(entry) => return Ok(Some(self.store_fetched(entry).await)),
        NetworkOutcome::Status(response) => return self.handle_status(response, cached).await,
        NetworkOutcome::Unreachable => {}
      }
    }

    // Last resort: anything cached, however old
    match cached {
      Some(entry) => Ok(Some(CacheResult::from_cache(
        entry.payload,
        entry.stored_at,
        true,
      ))),
      None => no_data(storage_failed),
    }
  }

  async fn stale_while_revalidate(
    &self,
    url: &Url,
    key: &RequestKey,
    options: &FetchOptions,
  ) -> Result<Option<CacheResult<Payload>>> {
    let Lookup {
      entry: cached,
      storage_failed,
    } = self.lookup(key).await;

    if let Some(entry) = cached {
      if !options.offline {
        self.spawn_revalidate(url.clone(), key.clone());
      }
      let is_stale = !entry.is_fresh(self.clock.now(), options.max_age);
      return Ok(Some(CacheResult::from_cache(
        entry.payload,
        entry.stored_at,
        is_stale,
      )));
    }

    // Nothing to serve yet, so this one caller has to wait for the network
    if !options.offline {
      match self.fetch_network(url, key, None).await {
        NetworkOutcome::Fetched(entry) => return Ok(Some(self.store_fetched(entry).await)),
        NetworkOutcome::Status(response) => return self.handle_status(response, None).await,
        NetworkOutcome::Unreachable => {}
      }
    }

    no_data(storage_failed)
  }

  /// Refresh the entry in a detached task. Nobody joins it; failures are only logged.
  ///
  /// At most one refresh per key runs at a time.
  fn spawn_revalidate(&self, url: Url, key: RequestKey) {
    let Some(slot) = RefreshSlot::claim(&self.refreshing, key.identity()) else {
      debug!(key = %key, "background refresh already running");
      return;
    };
    let layer = self.clone();
    tokio::spawn(async move {
      let _slot = slot;
      match layer.fetch_network(&url, &key, None).await {
        NetworkOutcome::Fetched(entry) => {
          layer.store_fetched(entry).await;
        }
        NetworkOutcome::Status(response) => {
          debug!(key = %key, status = response.status, "background refresh rejected");
        }
        NetworkOutcome::Unreachable => {
          debug!(key = %key, "background refresh could not reach network");
        }
      }
    });
  }

  async fn fetch_network(&self, url: &Url, key: &RequestKey, etag: Option<&str>) -> NetworkOutcome {
    let request = if_none_match(Request::get(url.clone()), etag);

    match self.transport.send(&request).await {
      Ok(response) if response.is_success() => NetworkOutcome::Fetched(CacheEntry {
        key: key.identity().to_string(),
        payload: response.payload(),
        stored_at: self.clock.now(),
        etag: response.etag,
        content_type: response.content_type,
      }),
      Ok(response) => NetworkOutcome::Status(response),
      Err(err) => {
        debug!(key = %key, error = %err, "network fetch failed");
        NetworkOutcome::Unreachable
      }
    }
  }

  /// A 304 refreshes the cached copy; every other non-success status is the caller's.
  async fn handle_status(
    &self,
    response: Response,
    cached: Option<CacheEntry>,
  ) -> Result<Option<CacheResult<Payload>>> {
    match cached {
      Some(mut entry) if response.is_not_modified() => {
        entry.stored_at = self.clock.now();
        if let Some(etag) = response.etag {
          entry.etag = Some(etag);
        }
        let stored_at = entry.stored_at;
        let payload = entry.payload.clone();
        self.write_entry(&entry).await;
        Ok(Some(CacheResult::revalidated(payload, stored_at)))
      }
      _ => Err(Error::Status {
        status: response.status,
        payload: response.payload(),
      }),
    }
  }

  async fn store_fetched(&self, entry: CacheEntry) -> CacheResult<Payload> {
    self.write_entry(&entry).await;
    CacheResult::from_network(entry.payload, entry.stored_at)
  }

  /// Persist an entry; a newer entry already stored for the key wins.
  ///
  /// Storage failures are logged and swallowed: the caller still gets the data.
  async fn write_entry(&self, entry: &CacheEntry) {
    let storage_key = RequestKey::from_identity(&entry.key).storage_key();
    let value = match serde_json::to_vec(entry) {
      Ok(value) => value,
      Err(err) => {
        warn!(key = %entry.key, error = %err, "failed to encode cache entry");
        return;
      }
    };

    match self
      .storage
      .put_if_newer(
        Partition::Cache,
        &storage_key,
        &value,
        entry.stored_at.timestamp_millis(),
      )
      .await
    {
      Ok(true) => debug!(key = %entry.key, "cache updated"),
      Ok(false) => debug!(key = %entry.key, "newer cache entry already stored"),
      Err(err) => warn!(key = %entry.key, error = %err, "failed to write cache entry"),
    }
  }

  async fn lookup(&self, key: &RequestKey) -> Lookup {
    match self.read_entry(key).await {
      Ok(entry) => Lookup {
        entry,
        storage_failed: None,
      },
      Err(err) => {
        warn!(key = %key, error = %err, "cache read failed");
        Lookup {
          entry: None,
          storage_failed: Some(err),
        }
      }
    }
  }

  async fn read_entry(&self, key: &RequestKey) -> std::result::Result<Option<CacheEntry>, StoreError> {
    let Some(record) = self
      .storage
      .get(Partition::Cache, &key.storage_key())
      .await?
    else {
      return Ok(None);
    };

    match serde_json::from_slice::<CacheEntry>(&record.value) {
      Ok(entry) => Ok(Some(entry)),
      Err(err) => {
        warn!(key = %key, error = %err, "discarding undecodable cache entry");
        Ok(None)
      }
    }
  }
}

impl<S: Store, T: Transport> Clone for CacheLayer<S, T> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      transport: Arc::clone(&self.transport),
      clock: Arc::clone(&self.clock),
      refreshing: Arc::clone(&self.refreshing),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::clock::ManualClock;
  use crate::db::{Record, SqliteStore};
  use crate::error::StoreResult;
  use crate::net::testing::{FakeTransport, Reply};
  use chrono::Duration;
  use futures::future::BoxFuture;
  use futures::FutureExt;
  use serde_json::json;

  type Layer = CacheLayer<SqliteStore, FakeTransport>;

  fn setup(transport: FakeTransport) -> (Layer, Arc<FakeTransport>, ManualClock) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let transport = Arc::new(transport);
    let clock = ManualClock::default();
    let layer = CacheLayer::new(store, transport.clone()).with_clock(Arc::new(clock.clone()));
    (layer, transport, clock)
  }

  fn dashboard() -> Url {
    Url::parse("https://api.example.com/api/dashboard").unwrap()
  }

  fn five_minutes() -> FetchOptions {
    FetchOptions::new(Duration::minutes(5))
  }

  #[tokio::test]
  async fn test_network_first_updates_cache_monotonically() {
    let (layer, transport, clock) = setup(FakeTransport::ok());
    transport
      .push(Reply::Status(200, json!({"v": 1})))
      .push(Reply::Status(200, json!({"v": 2})));

    let first = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap()
      .unwrap();
    clock.advance(Duration::seconds(30));
    let second = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap()
      .unwrap();

    assert_eq!(second.source, CacheSource::Network);
    assert!(second.stored_at >= first.stored_at);
    let cached = layer.cached(&dashboard()).await.unwrap().unwrap();
    assert_eq!(cached.payload, Payload::Json(json!({"v": 2})));
    assert_eq!(Some(cached.stored_at), second.stored_at);
  }

  #[tokio::test]
  async fn test_network_first_serves_cache_offline_within_max_age() {
    let (layer, transport, clock) = setup(FakeTransport::unreachable());
    transport.push(Reply::Status(200, json!({"steps": 4200})));

    let online = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap()
      .unwrap();

    clock.advance(Duration::minutes(4));
    let offline = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap()
      .unwrap();

    assert_eq!(offline.source, CacheSource::Offline);
    assert_eq!(offline.data, online.data);
    assert_eq!(offline.stored_at, online.stored_at);
  }

  #[tokio::test]
  async fn test_network_first_refuses_entries_past_max_age() {
    let (layer, transport, clock) = setup(FakeTransport::unreachable());
    transport.push(Reply::Status(200, json!({"steps": 4200})));

    layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap();

    clock.advance(Duration::minutes(6));
    let result = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap();

    assert!(result.is_none());
  }

  #[tokio::test]
  async fn test_offline_option_skips_network() {
    let (layer, transport, _clock) = setup(FakeTransport::ok());

    let result = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes().offline(true))
      .await
      .unwrap();

    assert!(result.is_none());
    assert_eq!(transport.call_count(), 0);
  }

  #[tokio::test]
  async fn test_http_error_status_is_returned_and_not_cached() {
    let (layer, transport, _clock) = setup(FakeTransport::ok());
    transport.push(Reply::Status(404, json!({"error": "missing"})));

    let err = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap_err();

    assert!(matches!(err, Error::Status { status: 404, .. }));
    assert!(layer.cached(&dashboard()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_cache_first_fresh_hit_makes_no_network_call() {
    let (layer, transport, clock) = setup(FakeTransport::ok());
    let logo = Url::parse("https://app.example.com/static/logo.svg").unwrap();
    let options = FetchOptions::new(Duration::days(30));

    layer
      .fetch_with_strategy(&logo, Strategy::CacheFirst, &options)
      .await
      .unwrap();
    assert_eq!(transport.call_count(), 1);

    clock.advance(Duration::days(1));
    let hit = layer
      .fetch_with_strategy(&logo, Strategy::CacheFirst, &options)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(hit.source, CacheSource::CacheFresh);
    assert_eq!(transport.call_count(), 1);
  }

  #[tokio::test]
  async fn test_cache_first_falls_back_to_stale_entry() {
    let (layer, transport, clock) = setup(FakeTransport::unreachable());
    transport.push(Reply::Status(200, json!("asset")));
    let options = FetchOptions::new(Duration::minutes(1));

    layer
      .fetch_with_strategy(&dashboard(), Strategy::CacheFirst, &options)
      .await
      .unwrap();
    clock.advance(Duration::hours(2));

    let stale = layer
      .fetch_with_strategy(&dashboard(), Strategy::CacheFirst, &options)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(stale.source, CacheSource::CacheStale);
    assert_eq!(stale.data, Payload::Json(json!("asset")));
    assert_eq!(transport.call_count(), 2);
  }

  #[tokio::test]
  async fn test_cache_first_without_cache_or_network_is_no_data() {
    let (layer, _transport, _clock) = setup(FakeTransport::unreachable());

    let result = layer
      .fetch_with_strategy(&dashboard(), Strategy::CacheFirst, &five_minutes())
      .await
      .unwrap();

    assert!(result.is_none());
  }

  #[tokio::test]
  async fn test_revalidation_with_etag_refreshes_stored_at() {
    let (layer, transport, clock) = setup(FakeTransport::ok());
    transport
      .push(Reply::Tagged(json!({"v": 1}), "\"abc\""))
      .push(Reply::NotModified);

    layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap();
    clock.advance(Duration::minutes(10));

    let result = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap()
      .unwrap();

    assert_eq!(result.source, CacheSource::Revalidated);
    assert_eq!(result.data, Payload::Json(json!({"v": 1})));
    assert_eq!(result.stored_at, Some(clock.now()));
    let calls = transport.calls();
    assert_eq!(calls[1].header("if-none-match"), Some("\"abc\""));
  }

  #[tokio::test]
  async fn test_stale_while_revalidate_does_not_wait_for_network() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = ManualClock::default();

    // Seed through an unblocked transport
    let seeder = CacheLayer::new(store.clone(), Arc::new(FakeTransport::ok()))
      .with_clock(Arc::new(clock.clone()));
    seeder
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap();
    clock.advance(Duration::hours(1));

    let (blocked, gate) = FakeTransport::ok().gated();
    let blocked = Arc::new(blocked);
    let layer = CacheLayer::new(store, blocked.clone()).with_clock(Arc::new(clock.clone()));

    let result = tokio::time::timeout(
      std::time::Duration::from_secs(1),
      layer.fetch_with_strategy(&dashboard(), Strategy::StaleWhileRevalidate, &five_minutes()),
    )
    .await
    .expect("stale-while-revalidate blocked on the network")
    .unwrap()
    .unwrap();

    assert_eq!(result.source, CacheSource::CacheStale);
    gate.notify_one();
  }

  #[tokio::test]
  async fn test_stale_while_revalidate_runs_one_refresh_per_key() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = ManualClock::default();

    let seeder = CacheLayer::new(store.clone(), Arc::new(FakeTransport::ok()))
      .with_clock(Arc::new(clock.clone()));
    seeder
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap();

    let (blocked, gate) = FakeTransport::ok().gated();
    let blocked = Arc::new(blocked);
    let layer = CacheLayer::new(store, blocked.clone()).with_clock(Arc::new(clock.clone()));

    for _ in 0..3 {
      let result = layer
        .fetch_with_strategy(&dashboard(), Strategy::StaleWhileRevalidate, &five_minutes())
        .await
        .unwrap()
        .unwrap();
      assert_eq!(result.source, CacheSource::CacheFresh);
    }
    while blocked.call_count() == 0 {
      tokio::task::yield_now().await;
    }
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    assert_eq!(blocked.call_count(), 1);

    // Once the refresh lands the key can be refreshed again
    gate.notify_one();
    for _ in 0..50 {
      if layer.refreshing.lock().unwrap().is_empty() {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    layer
      .fetch_with_strategy(&dashboard(), Strategy::StaleWhileRevalidate, &five_minutes())
      .await
      .unwrap();
    while blocked.call_count() < 2 {
      tokio::task::yield_now().await;
    }
    gate.notify_one();
  }

  #[tokio::test]
  async fn test_stale_while_revalidate_refreshes_for_next_caller() {
    let (layer, transport, clock) = setup(FakeTransport::ok());
    transport
      .push(Reply::Status(200, json!({"items": [1]})))
      .push(Reply::Status(200, json!({"items": [1, 2]})));

    let first = layer
      .fetch_with_strategy(&dashboard(), Strategy::StaleWhileRevalidate, &five_minutes())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    clock.advance(Duration::seconds(1));
    let second = layer
      .fetch_with_strategy(&dashboard(), Strategy::StaleWhileRevalidate, &five_minutes())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(second.data, Payload::Json(json!({"items": [1]})));

    let mut refreshed = None;
    for _ in 0..50 {
      let entry = layer.cached(&dashboard()).await.unwrap().unwrap();
      if entry.payload == Payload::Json(json!({"items": [1, 2]})) {
        refreshed = Some(entry);
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(refreshed.is_some(), "background refresh never landed");
  }

  #[tokio::test]
  async fn test_older_fetch_does_not_overwrite_newer_entry() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let late_clock = ManualClock::default();
    let early_clock = ManualClock::new(late_clock.now() - Duration::seconds(5));

    let late = Arc::new(FakeTransport::with_fallback(Reply::Status(200, json!("late"))));
    let early = Arc::new(FakeTransport::with_fallback(Reply::Status(200, json!("early"))));

    CacheLayer::new(store.clone(), late)
      .with_clock(Arc::new(late_clock))
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap();
    let slow = CacheLayer::new(store, early).with_clock(Arc::new(early_clock));
    slow
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap();

    let cached = slow.cached(&dashboard()).await.unwrap().unwrap();
    assert_eq!(cached.payload, Payload::Json(json!("late")));
  }

  /// A store whose every operation fails.
  struct BrokenStore;

  impl Store for BrokenStore {
    fn put<'a>(&'a self, _: Partition, _: &'a str, _: &'a [u8]) -> BoxFuture<'a, StoreResult<()>> {
      async { Err(StoreError::LockPoisoned("broken".into())) }.boxed()
    }

    fn put_if_newer<'a>(
      &'a self,
      _: Partition,
      _: &'a str,
      _: &'a [u8],
      _: i64,
    ) -> BoxFuture<'a, StoreResult<bool>> {
      async { Err(StoreError::LockPoisoned("broken".into())) }.boxed()
    }

    fn update<'a>(&'a self, _: Partition, _: &'a str, _: &'a [u8]) -> BoxFuture<'a, StoreResult<bool>> {
      async { Err(StoreError::LockPoisoned("broken".into())) }.boxed()
    }

    fn get<'a>(&'a self, _: Partition, _: &'a str) -> BoxFuture<'a, StoreResult<Option<Record>>> {
      async { Err(StoreError::LockPoisoned("broken".into())) }.boxed()
    }

    fn get_all(&self, _: Partition) -> BoxFuture<'_, StoreResult<Vec<Record>>> {
      async { Err(StoreError::LockPoisoned("broken".into())) }.boxed()
    }

    fn delete<'a>(&'a self, _: Partition, _: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
      async { Err(StoreError::LockPoisoned("broken".into())) }.boxed()
    }

    fn count(&self, _: Partition) -> BoxFuture<'_, StoreResult<usize>> {
      async { Err(StoreError::LockPoisoned("broken".into())) }.boxed()
    }

    fn clear(&self, _: Partition) -> BoxFuture<'_, StoreResult<usize>> {
      async { Err(StoreError::LockPoisoned("broken".into())) }.boxed()
    }
  }

  #[tokio::test]
  async fn test_storage_failure_degrades_when_network_answers() {
    let layer = CacheLayer::new(Arc::new(BrokenStore), Arc::new(FakeTransport::ok()));

    let result = layer
      .fetch_with_strategy(&dashboard(), Strategy::CacheFirst, &five_minutes())
      .await
      .unwrap()
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_storage_failure_without_network_is_reported_as_storage() {
    let layer = CacheLayer::new(Arc::new(BrokenStore), Arc::new(FakeTransport::unreachable()));

    let err = layer
      .fetch_with_strategy(&dashboard(), Strategy::NetworkFirst, &five_minutes())
      .await
      .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
  }
}
