//! Scripted transport for unit tests.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::transport::{Request, Response, Transport};
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub enum Reply {
  Status(u16, Value),
  /// 200 carrying an ETag
  Tagged(Value, &'static str),
  NotModified,
  Fail,
}

/// Replies from a queue, then falls back to a fixed reply. Records every call.
#[derive(Debug)]
pub struct FakeTransport {
  replies: Mutex<VecDeque<Reply>>,
  fallback: Reply,
  calls: Mutex<Vec<Request>>,
  gate: Option<Arc<Notify>>,
}

impl FakeTransport {
  /// Every unscripted call succeeds with `200 {}`.
  pub fn ok() -> Self {
    Self::with_fallback(Reply::Status(200, serde_json::json!({})))
  }

  /// Every unscripted call fails as if the network were down.
  pub fn unreachable() -> Self {
    Self::with_fallback(Reply::Fail)
  }

  pub fn with_fallback(fallback: Reply) -> Self {
    Self {
      replies: Mutex::new(VecDeque::new()),
      fallback,
      calls: Mutex::new(Vec::new()),
      gate: None,
    }
  }

  /// Block each call until the returned handle is notified.
  pub fn gated(mut self) -> (Self, Arc<Notify>) {
    let gate = Arc::new(Notify::new());
    self.gate = Some(gate.clone());
    (self, gate)
  }

  pub fn push(&self, reply: Reply) -> &Self {
    self.replies.lock().unwrap().push_back(reply);
    self
  }

  pub fn calls(&self) -> Vec<Request> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

impl Transport for FakeTransport {
  fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
    async move {
      self.calls.lock().unwrap().push(request.clone());
      if let Some(gate) = &self.gate {
        gate.notified().await;
      }

      let reply = self
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| self.fallback.clone());

      match reply {
        Reply::Status(status, body) => Ok(Response {
          status,
          body: serde_json::to_vec(&body).unwrap(),
          content_type: Some("application/json".to_string()),
          etag: None,
        }),
        Reply::Tagged(body, etag) => Ok(Response {
          status: 200,
          body: serde_json::to_vec(&body).unwrap(),
          content_type: Some("application/json".to_string()),
          etag: Some(etag.to_string()),
        }),
        Reply::NotModified => Ok(Response {
          status: 304,
          body: Vec::new(),
          content_type: None,
          etag: None,
        }),
        Reply::Fail => Err(TransportError::Connect {
          url: request.url.to_string(),
          message: "connection refused".to_string(),
        }),
      }
    }
    .boxed()
  }
}
