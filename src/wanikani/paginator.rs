//! Cursor-based pagination with retries.

use futures::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::api_types::{ApiCollection, ApiErrorBody};
use super::rate_limit::RateLimiter;
use super::transport::{HttpResponse, Transport};
use crate::error::ClientError;

/// How transient failures of a single request are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_retries: u32,
  /// Delay before the first retry; doubles for each further retry
  pub base_backoff: Duration,
}

impl RetryPolicy {
  fn backoff(&self, retry: u32) -> Duration {
    self
      .base_backoff
      .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      base_backoff: Duration::from_millis(500),
    }
  }
}

/// Issues rate-limited, retried GET requests and walks `pages.next_url`
/// chains to completion.
pub struct Paginator<'a, T> {
  transport: &'a T,
  limiter: &'a RateLimiter,
  retry: RetryPolicy,
}

impl<T> Clone for Paginator<'_, T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Paginator<'_, T> {}

struct PageRequest {
  url: Url,
  cursor: Option<String>,
}

impl<'a, T: Transport> Paginator<'a, T> {
  pub fn new(transport: &'a T, limiter: &'a RateLimiter, retry: RetryPolicy) -> Self {
    Self {
      transport,
      limiter,
      retry,
    }
  }

  /// Lazily yield every item of the collection starting at `start`.
  ///
  /// Pages are requested one at a time as the stream is polled. The stream
  /// ends after the page whose `next_url` is null, and stops at the first
  /// error. Polling a fresh stream starts over from `start`.
  pub fn items(self, start: Url) -> impl Stream<Item = Result<Value, ClientError>> + 'a {
    let first = PageRequest {
      url: start,
      cursor: None,
    };

    stream::try_unfold(Some(first), move |next| async move {
      let Some(request) = next else {
        return Ok(None);
      };

      let page: ApiCollection = self
        .fetch_document(&request.url, request.cursor.as_deref())
        .await?;
      debug!(
        endpoint = request.url.path(),
        items = page.data.len(),
        has_next = page.pages.next_url.is_some(),
        "fetched page"
      );

      let following = match page.pages.next_url {
        Some(next_url) => {
          let url = Url::parse(&next_url).map_err(|e| {
            ClientError::fetch(
              request.url.path(),
              Some(&next_url),
              format!("invalid next_url: {}", e),
            )
          })?;
          Some(PageRequest {
            url,
            cursor: Some(next_url),
          })
        }
        None => None,
      };

      Ok::<_, ClientError>(Some((page.data, following)))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<Value, ClientError>)))
    .try_flatten()
  }

  /// Drain the whole collection into memory.
  pub async fn collect_all(self, start: Url) -> Result<Vec<Value>, ClientError> {
    self.items(start).try_collect().await
  }

  /// GET a single JSON document, applying rate limiting and retries.
  ///
  /// - 2xx: body decoded as `D`; an undecodable body is a fetch error
  /// - 401/403: auth error, no retry
  /// - 429: wait for the server's hint (or one limiter interval), retry once
  /// - 5xx, timeouts and network errors: retried with exponential backoff
  /// - anything else: fetch error, no retry
  pub async fn fetch_document<D: DeserializeOwned>(
    self,
    url: &Url,
    cursor: Option<&str>,
  ) -> Result<D, ClientError> {
    let endpoint = url.path();
    let mut retries = 0u32;
    let mut throttled = false;

    loop {
      self.limiter.acquire().await;

      let failure = match self.transport.get(url).await {
        Ok(response) if response.is_success() => {
          return serde_json::from_str(&response.body).map_err(|e| {
            ClientError::fetch(endpoint, cursor, format!("malformed response body: {}", e))
          });
        }
        Ok(response) if matches!(response.status, 401 | 403) => {
          return Err(ClientError::Auth {
            reason: auth_reason(&response),
          });
        }
        Ok(response) if response.status == 429 => {
          if throttled {
            return Err(ClientError::fetch(
              endpoint,
              cursor,
              "rate limited again after waiting",
            ));
          }
          throttled = true;
          let wait = response
            .retry_after
            .unwrap_or_else(|| self.limiter.min_interval());
          warn!(endpoint, wait_ms = wait.as_millis() as u64, "rate limited by server");
          tokio::time::sleep(wait).await;
          continue;
        }
        Ok(response) if response.status >= 500 => format!("server error (HTTP {})", response.status),
        Ok(response) => {
          return Err(ClientError::fetch(
            endpoint,
            cursor,
            format!("unexpected HTTP {}", response.status),
          ));
        }
        Err(e) => e.to_string(),
      };

      retries += 1;
      if retries > self.retry.max_retries {
        return Err(ClientError::fetch(
          endpoint,
          cursor,
          format!("{} (gave up after {} retries)", failure, self.retry.max_retries),
        ));
      }

      let delay = self.retry.backoff(retries);
      warn!(
        endpoint,
        retry = retries,
        delay_ms = delay.as_millis() as u64,
        %failure,
        "request failed, retrying"
      );
      tokio::time::sleep(delay).await;
    }
  }
}

fn auth_reason(response: &HttpResponse) -> String {
  match serde_json::from_str::<ApiErrorBody>(&response.body) {
    Ok(body) => format!("{} (HTTP {})", body.error, response.status),
    Err(_) => format!("API token rejected (HTTP {})", response.status),
  }
}
