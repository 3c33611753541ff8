//! Remote HTTP collaborator.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, ETAG, IF_NONE_MATCH, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::cache::Payload;
use crate::error::TransportError;

const USER_AGENT_VALUE: &str = concat!("wellsync/", env!("CARGO_PKG_VERSION"));

/// An outbound request as seen by the engine.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub body: Option<Value>,
  pub headers: Vec<(String, String)>,
}

impl Request {
  pub fn new(method: Method, url: Url) -> Self {
    Self {
      method,
      url,
      body: None,
      headers: Vec::new(),
    }
  }

  pub fn get(url: Url) -> Self {
    Self::new(Method::GET, url)
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// A response that made it back from the remote, whatever its status.
#[derive(Debug, Clone)]
pub struct Response {
  pub status: u16,
  pub body: Vec<u8>,
  pub content_type: Option<String>,
  pub etag: Option<String>,
}

impl Response {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn is_not_modified(&self) -> bool {
    self.status == 304
  }

  pub fn payload(&self) -> Payload {
    Payload::from_bytes(self.content_type.as_deref(), &self.body)
  }
}

/// Sends requests to the remote.
///
/// Implementations return `Ok` for every HTTP status and `Err` only when no
/// response was obtained (timeout, DNS, refused connection).
pub trait Transport: Send + Sync + 'static {
  fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>>;
}

/// `reqwest`-backed transport with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  token: Option<String>,
}

impl HttpTransport {
  pub fn new(timeout: Duration, token: Option<String>) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| TransportError::Request {
        url: String::new(),
        message: format!("failed to create HTTP client: {}", e),
      })?;

    Ok(Self { client, token })
  }

  async fn send_inner(&self, request: &Request) -> Result<Response, TransportError> {
    let url = request.url.as_str();
    let mut builder = self
      .client
      .request(request.method.clone(), request.url.clone())
      .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    if let Some(token) = &self.token {
      builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
      let bytes = serde_json::to_vec(body).map_err(|e| TransportError::Request {
        url: url.to_string(),
        message: format!("failed to encode body: {}", e),
      })?;
      builder = builder.header(CONTENT_TYPE, "application/json").body(bytes);
    }

    let response = builder.send().await.map_err(|e| map_error(url, e))?;

    let status = response.status().as_u16();
    let header = |name: HeaderName| {
      response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
    };
    let content_type = header(CONTENT_TYPE);
    let etag = header(ETAG);

    let body = response.bytes().await.map_err(|e| map_error(url, e))?;

    Ok(Response {
      status,
      body: body.to_vec(),
      content_type,
      etag,
    })
  }
}

impl Transport for HttpTransport {
  fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
    self.send_inner(request).boxed()
  }
}

fn map_error(url: &str, err: reqwest::Error) -> TransportError {
  if err.is_timeout() {
    TransportError::Timeout {
      url: url.to_string(),
    }
  } else if err.is_connect() {
    TransportError::Connect {
      url: url.to_string(),
      message: err.to_string(),
    }
  } else {
    TransportError::Request {
      url: url.to_string(),
      message: err.to_string(),
    }
  }
}

/// Header carrying a cached entry's validator.
pub(crate) fn if_none_match(request: Request, etag: Option<&str>) -> Request {
  match etag {
    Some(etag) => request.with_header(IF_NONE_MATCH.as_str(), etag),
    None => request,
  }
}
