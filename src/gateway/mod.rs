//! Single entry point for outbound requests.
//!
//! Every request is classified, then either read through a cache strategy,
//! written (directly when online, into the mutation queue otherwise) or passed
//! through untouched. Callers always get a [`GatewayResponse`]; unavailability
//! is an answer, not an error.

mod response;
mod routes;

pub use response::{GatewayResponse, OfflineResponse, UnavailableReason};
pub use routes::{ResourceClass, Route, RouteRule, RouteTable};

use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheLayer, FetchOptions, Strategy};
use crate::clock::{Clock, SystemClock};
use crate::db::Store;
use crate::error::{Error, Result};
use crate::event::SyncRequester;
use crate::net::{ConnectivityWatch, Request, Transport};
use crate::sync::{MutationQueue, PendingMutation, IDEMPOTENCY_HEADER};

pub struct RequestGateway<S: Store, T: Transport> {
  cache: CacheLayer<S, T>,
  queue: MutationQueue<S>,
  transport: Arc<T>,
  routes: RouteTable,
  connectivity: ConnectivityWatch,
  base_url: Url,
  clock: Arc<dyn Clock>,
  sync_requester: Option<SyncRequester>,
}

impl<S: Store, T: Transport> RequestGateway<S, T> {
  pub fn new(
    cache: CacheLayer<S, T>,
    queue: MutationQueue<S>,
    transport: Arc<T>,
    connectivity: ConnectivityWatch,
    base_url: Url,
  ) -> Self {
    Self {
      cache,
      queue,
      transport,
      routes: RouteTable::default(),
      connectivity,
      base_url,
      clock: Arc::new(SystemClock),
      sync_requester: None,
    }
  }

  pub fn with_routes(mut self, routes: RouteTable) -> Self {
    self.routes = routes;
    self
  }

  /// Timestamp queued mutations with `clock`.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Poke `requester` whenever a write is queued while online.
  pub fn with_sync_requester(mut self, requester: SyncRequester) -> Self {
    self.sync_requester = Some(requester);
    self
  }

  /// Resolve `path` against the base URL. Absolute URLs pass through.
  pub fn resolve(&self, path: &str) -> Result<Url> {
    Ok(self.base_url.join(path)?)
  }

  pub async fn get(&self, path: &str) -> Result<GatewayResponse> {
    let url = self.resolve(path)?;
    Ok(self.handle(Request::get(url)).await)
  }

  pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<GatewayResponse> {
    let mut request = Request::new(method, self.resolve(path)?);
    request.body = body;
    Ok(self.handle(request).await)
  }

  pub fn classify(&self, request: &Request) -> Route {
    self.routes.classify(&request.method, &request.url)
  }

  pub async fn handle(&self, request: Request) -> GatewayResponse {
    let route = self.classify(&request);
    debug!(method = %request.method, url = %request.url, class = %route.class, "routing request");

    match (route.class, route.strategy) {
      (ResourceClass::ApiWrite, _) => self.write(request).await,
      (_, Some(strategy)) => self.read(&request.url, strategy, route).await,
      (_, None) => self.passthrough(request).await,
    }
  }

  async fn read(&self, url: &Url, strategy: Strategy, route: Route) -> GatewayResponse {
    let options = FetchOptions::new(route.max_age).offline(!self.connectivity.is_online());

    match self.cache.fetch_with_strategy(url, strategy, &options).await {
      Ok(Some(result)) => GatewayResponse::Data {
        payload: result.data,
        source: result.source,
        stored_at: result.stored_at,
        class: route.class,
      },
      Ok(None) => GatewayResponse::unavailable(
        UnavailableReason::Offline,
        format!("{} is not cached and the network is unreachable", url),
      ),
      Err(Error::Status { status, payload }) => GatewayResponse::Upstream { status, payload },
      Err(err @ Error::Storage(_)) => {
        warn!(url = %url, error = %err, "read failed on storage");
        GatewayResponse::unavailable(UnavailableReason::Storage, err.to_string())
      }
      Err(err) => {
        warn!(url = %url, error = %err, "read failed");
        GatewayResponse::unavailable(UnavailableReason::Offline, err.to_string())
      }
    }
  }

  async fn write(&self, request: Request) -> GatewayResponse {
    let mutation = PendingMutation::new(
      &request.method,
      &request.url,
      request.body.clone(),
      self.clock.now(),
    );
    let online = self.connectivity.is_online();

    if online {
      match self.queue.has_pending_for(&mutation.resource()).await {
        Ok(false) => {
          let request = request.with_header(IDEMPOTENCY_HEADER, mutation.id.as_str());
          match self.transport.send(&request).await {
            Ok(response) => {
              if response.is_success() {
                self.invalidate_read(&request.url).await;
              }
              return GatewayResponse::Upstream {
                status: response.status,
                payload: response.payload(),
              };
            }
            Err(err) => {
              warn!(url = %request.url, error = %err, "direct write failed, queueing");
            }
          }
        }
        Ok(true) => {
          debug!(resource = %mutation.resource(), "earlier writes still queued, queueing behind them");
        }
        Err(err) => {
          warn!(error = %err, "could not inspect mutation queue");
          return GatewayResponse::unavailable(UnavailableReason::Storage, err.to_string());
        }
      }
    }

    match self.queue.enqueue(&mutation).await {
      Ok(pending) => {
        info!(id = %mutation.id, method = %mutation.method, endpoint = %mutation.endpoint, pending, "write queued");
        if online {
          if let Some(requester) = &self.sync_requester {
            requester.request();
          }
        }
        GatewayResponse::Queued {
          mutation_id: mutation.id,
          pending,
        }
      }
      Err(err @ Error::QueueFull { .. }) => {
        GatewayResponse::unavailable(UnavailableReason::QueueFull, err.to_string())
      }
      Err(err) => {
        warn!(error = %err, "could not queue write");
        GatewayResponse::unavailable(UnavailableReason::Storage, err.to_string())
      }
    }
  }

  async fn passthrough(&self, request: Request) -> GatewayResponse {
    if !self.connectivity.is_online() {
      return GatewayResponse::unavailable(
        UnavailableReason::Offline,
        format!("{} {} needs the network", request.method, request.url),
      );
    }

    match self.transport.send(&request).await {
      Ok(response) => GatewayResponse::Upstream {
        status: response.status,
        payload: response.payload(),
      },
      Err(err) => GatewayResponse::unavailable(UnavailableReason::Offline, err.to_string()),
    }
  }

  /// A successful write makes any cached read of the same URL stale.
  async fn invalidate_read(&self, url: &Url) {
    if let Err(err) = self.cache.invalidate(url).await {
      warn!(url = %url, error = %err, "failed to invalidate cached read");
    }
  }
}
