//! HTTP transport used by the paginator.
//!
//! The paginator only needs "GET this URL and tell me the status, body and
//! any retry hint", so that is all the [`Transport`] trait asks for. The
//! production implementation is [`HttpTransport`] over reqwest.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Header pinning the API revision the response shapes are written against.
const REVISION_HEADER: &str = "wanikani-revision";
/// Unix timestamp at which the current rate-limit window resets.
const RATE_LIMIT_RESET_HEADER: &str = "ratelimit-reset";

#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  /// Delay requested by the server before retrying, if any
  pub retry_after: Option<Duration>,
  pub body: String,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// A request that never produced a response. Always worth retrying.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
  #[error("request timed out")]
  Timeout,
  #[error("network error: {0}")]
  Network(String),
}

impl From<reqwest::Error> for TransportError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      TransportError::Timeout
    } else {
      TransportError::Network(e.to_string())
    }
  }
}

pub trait Transport: Send + Sync {
  fn get(&self, url: &Url) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// reqwest-backed transport carrying the bearer token and revision header.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new(token: &str, revision: &str, timeout: Duration) -> Result<Self> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|_| eyre!("API token contains characters not allowed in a header"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(
      REVISION_HEADER,
      HeaderValue::from_str(revision).map_err(|e| eyre!("Invalid API revision: {}", e))?,
    );

    let client = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(timeout)
      .user_agent(concat!("wk-vocab/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
    let response = self.client.get(url.clone()).send().await?;
    let status = response.status().as_u16();
    let retry_after = retry_delay(response.headers());
    let body = response.text().await?;

    Ok(HttpResponse {
      status,
      retry_after,
      body,
    })
  }
}

/// Read the server's retry hint: `Retry-After` seconds, else the time left
/// until `RateLimit-Reset`.
fn retry_delay(headers: &HeaderMap) -> Option<Duration> {
  let header = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.trim().parse::<i64>().ok())
  };

  if let Some(secs) = header(RETRY_AFTER.as_str()) {
    return Some(Duration::from_secs(secs.max(0) as u64));
  }
  header(RATE_LIMIT_RESET_HEADER).map(|reset| {
    let wait = reset - Utc::now().timestamp();
    Duration::from_secs(wait.max(0) as u64)
  })
}

#[cfg(test)]
pub mod fake {
  //! Scripted transport for tests.

  use super::*;
  use std::sync::Mutex;

  type Responder = Box<dyn Fn(&Url, usize) -> Result<HttpResponse, TransportError> + Send + Sync>;

  /// Answers each request by calling a responder with the URL and the
  /// zero-based request number, and records every requested URL.
  pub struct FakeTransport {
    responder: Responder,
    requests: Mutex<Vec<Url>>,
  }

  impl FakeTransport {
    pub fn new(
      responder: impl Fn(&Url, usize) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
      Self {
        responder: Box::new(responder),
        requests: Mutex::new(Vec::new()),
      }
    }

    pub fn requests(&self) -> Vec<Url> {
      self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
      self.requests.lock().unwrap().len()
    }
  }

  impl Transport for FakeTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
      let n = {
        let mut requests = self.requests.lock().unwrap();
        requests.push(url.clone());
        requests.len() - 1
      };
      (self.responder)(url, n)
    }
  }

  pub fn ok(body: serde_json::Value) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
      status: 200,
      retry_after: None,
      body: body.to_string(),
    })
  }

  pub fn status(status: u16) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
      status,
      retry_after: None,
      body: String::new(),
    })
  }

  /// A collection page with `count` items numbered from `first_id`.
  pub fn page(first_id: u64, count: u64, next_url: Option<&str>) -> serde_json::Value {
    let data: Vec<serde_json::Value> = (first_id..first_id + count)
      .map(|id| serde_json::json!({ "id": id }))
      .collect();
    serde_json::json!({
      "object": "collection",
      "pages": { "next_url": next_url },
      "data": data,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_retry_after_seconds() {
    let mut headers = HeaderMap::new();
    headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
    assert_eq!(retry_delay(&headers), Some(Duration::from_secs(7)));
  }

  #[test]
  fn test_rate_limit_reset_in_the_past_is_zero() {
    let mut headers = HeaderMap::new();
    headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from_static("1000"));
    assert_eq!(retry_delay(&headers), Some(Duration::ZERO));
  }

  #[test]
  fn test_no_hint() {
    assert_eq!(retry_delay(&HeaderMap::new()), None);
  }

  #[test]
  fn test_token_with_newline_is_rejected() {
    assert!(HttpTransport::new("bad\ntoken", "20170710", Duration::from_secs(5)).is_err());
  }
}
