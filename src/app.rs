use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use wellsync::cache::CacheLayer;
use wellsync::db::{Partition, SqliteStore, Store};
use wellsync::event::{self, EventHandler};
use wellsync::gateway::{GatewayResponse, RequestGateway};
use wellsync::net::{connectivity, reachable, HttpTransport, ReachabilityProbe};
use wellsync::sync::{MutationQueue, PendingMutation, SyncCoordinator, SyncResult, SyncState, SyncTrigger};

type Gateway = RequestGateway<SqliteStore, HttpTransport>;
type Coordinator = SyncCoordinator<SqliteStore, HttpTransport>;

/// What `clear` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ClearTarget {
  Cache,
  Mutations,
  All,
}

#[derive(Debug, Serialize)]
pub struct Status {
  pub online: bool,
  pub state: SyncState,
  pub pending: usize,
  pub mutations: Vec<PendingMutation>,
  pub last_result: Option<SyncResult>,
}

/// The wired-up engine for one process.
pub struct App {
  store: Arc<SqliteStore>,
  queue: MutationQueue<SqliteStore>,
  gateway: Gateway,
  coordinator: Arc<Coordinator>,
  probe: ReachabilityProbe<HttpTransport>,
  events: EventHandler,
  offline: bool,
  config: Config,
}

impl App {
  pub async fn new(config: Config, offline: bool) -> Result<Self> {
    let store = Arc::new(match &config.store.path {
      Some(path) => SqliteStore::open(path)?,
      None => SqliteStore::open_default()?,
    });
    let transport = Arc::new(HttpTransport::new(
      config.remote.timeout(),
      Config::get_api_token(),
    )?);
    let base_url = config.remote.base_url()?;
    let health_url = config.remote.health_url()?;

    // Seed the connectivity state with current reachability
    let online = !offline && reachable(transport.as_ref(), &health_url).await;
    let (publisher, watch) = connectivity::channel(online);
    info!(online, forced_offline = offline, "starting");

    let events = EventHandler::new(watch.clone(), config.sync.tick_interval());
    let queue = MutationQueue::new(
      store.clone(),
      config.sync.queue_capacity,
      config.sync.overflow,
    );
    let cache = CacheLayer::new(store.clone(), transport.clone());
    let gateway = RequestGateway::new(
      cache,
      queue.clone(),
      transport.clone(),
      watch.clone(),
      base_url,
    )
    .with_routes(config.route_table())
    .with_sync_requester(events.requester());
    let coordinator = Arc::new(SyncCoordinator::new(
      queue.clone(),
      transport.clone(),
      config.sync.retry_policy(),
      watch,
    ));
    let probe = ReachabilityProbe::new(transport, health_url, publisher);

    Ok(Self {
      store,
      queue,
      gateway,
      coordinator,
      probe,
      events,
      offline,
      config,
    })
  }

  pub async fn get(&self, path: &str) -> Result<GatewayResponse> {
    Ok(self.gateway.get(path).await?)
  }

  /// Send a write. One that had to be queued while online is synced right away.
  pub async fn send(&self, method: &str, path: &str, body: Option<&str>) -> Result<GatewayResponse> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
      .map_err(|e| eyre!("Invalid method {:?}: {}", method, e))?;
    let body = body
      .map(serde_json::from_str::<Value>)
      .transpose()
      .map_err(|e| eyre!("Body is not valid JSON: {}", e))?;

    let response = self.gateway.send(method, path, body).await?;
    if response.is_queued() && self.probe.subscribe().is_online() {
      self.coordinator.sync_now().await?;
    }
    Ok(response)
  }

  pub async fn sync(&self) -> Result<SyncTrigger> {
    Ok(self.coordinator.sync_now().await?)
  }

  pub async fn status(&self) -> Result<Status> {
    let mutations = self.queue.pending().await?;
    Ok(Status {
      online: self.probe.subscribe().is_online(),
      state: self.coordinator.state(),
      pending: mutations.len(),
      mutations,
      last_result: self.coordinator.last_result(),
    })
  }

  pub async fn clear(&self, target: ClearTarget) -> Result<usize> {
    let partitions: &[Partition] = match target {
      ClearTarget::Cache => &[Partition::Cache],
      ClearTarget::Mutations => &[Partition::PendingMutations],
      ClearTarget::All => &[Partition::Cache, Partition::PendingMutations],
    };

    let mut removed = 0;
    for partition in partitions {
      let count = self.store.clear(*partition).await?;
      info!(%partition, count, "cleared partition");
      removed += count;
    }
    Ok(removed)
  }

  /// Keep probing and syncing until ctrl-c.
  pub async fn watch(self) -> Result<()> {
    let Self {
      coordinator,
      probe,
      events,
      offline,
      config,
      ..
    } = self;

    let mut results = coordinator.subscribe_results();
    let prober = (!offline).then(|| probe.spawn(config.remote.probe_interval()));

    // Drain whatever is left from earlier runs
    if coordinator.is_sync_needed().await? {
      coordinator.sync_now().await?;
    }

    let driver = tokio::spawn(event::run_sync_loop(events, coordinator));
    let reporter = tokio::spawn(async move {
      while results.changed().await.is_ok() {
        let result = results.borrow_and_update().clone();
        if let Some(result) = result {
          if let Ok(line) = serde_json::to_string(&result) {
            println!("{}", line);
          }
        }
      }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    driver.abort();
    reporter.abort();
    if let Some(prober) = prober {
      prober.abort();
    }
    Ok(())
  }
}
