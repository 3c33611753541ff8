//! Reachability probing, the connectivity listener of the CLI host.

use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use url::Url;

use super::connectivity::{ConnectivityPublisher, ConnectivityWatch};
use super::transport::{Request, Transport};

/// Whether the remote answers at all. Any HTTP status counts as reachable.
pub async fn reachable<T: Transport>(transport: &T, health_url: &Url) -> bool {
  let request = Request::new(Method::HEAD, health_url.clone());
  match transport.send(&request).await {
    Ok(response) => {
      debug!(status = response.status, url = %health_url, "remote reachable");
      true
    }
    Err(err) => {
      debug!(error = %err, "remote unreachable");
      false
    }
  }
}

/// Owns the connectivity publisher and feeds it probe results.
pub struct ReachabilityProbe<T: Transport> {
  transport: Arc<T>,
  health_url: Url,
  publisher: ConnectivityPublisher,
}

impl<T: Transport> ReachabilityProbe<T> {
  pub fn new(transport: Arc<T>, health_url: Url, publisher: ConnectivityPublisher) -> Self {
    Self {
      transport,
      health_url,
      publisher,
    }
  }

  pub fn subscribe(&self) -> ConnectivityWatch {
    self.publisher.subscribe()
  }

  /// Probe once and publish the result. Returns the observed reachability.
  pub async fn probe_once(&self) -> bool {
    let online = reachable(self.transport.as_ref(), &self.health_url).await;
    self.publisher.set_online(online);
    online
  }

  /// Probe every `every` until the task is aborted.
  pub fn spawn(self, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(every);
      interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        self.probe_once().await;
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::connectivity;
  use crate::net::testing::{FakeTransport, Reply};
  use serde_json::json;

  fn health() -> Url {
    Url::parse("https://api.example.com/health").unwrap()
  }

  #[tokio::test]
  async fn test_probe_publishes_transitions() {
    let transport = Arc::new(FakeTransport::unreachable());
    transport.push(Reply::Status(503, json!({})));
    let (publisher, watch) = connectivity::channel(false);
    let probe = ReachabilityProbe::new(transport.clone(), health(), publisher);

    // A 503 still means the remote is reachable
    assert!(probe.probe_once().await);
    assert!(watch.is_online());

    assert!(!probe.probe_once().await);
    assert!(!watch.is_online());

    let calls = transport.calls();
    assert_eq!(calls[0].method, Method::HEAD);
    assert_eq!(calls[0].url, health());
  }
}
