use color_eyre::{eyre::eyre, Result};
use tracing::info;
use url::Url;

use crate::config::{ApiConfig, Config};
use crate::error::{ClientError, Warning};
use crate::wanikani::api_types::ApiUserResponse;
use crate::wanikani::normalize::normalize;
use crate::wanikani::paginator::{Paginator, RetryPolicy};
use crate::wanikani::rate_limit::RateLimiter;
use crate::wanikani::transport::{HttpTransport, Transport};
use crate::wanikani::types::{UserInfo, VocabularySummary};

/// WaniKani API client: rate-limited, retried, uncached.
pub struct WaniKaniClient<T = HttpTransport> {
  transport: T,
  limiter: RateLimiter,
  retry: RetryPolicy,
  base_url: Url,
}

impl WaniKaniClient<HttpTransport> {
  pub fn new(config: &Config) -> Result<Self> {
    let token = config.api_token()?;
    let transport = HttpTransport::new(&token, &config.api.revision, config.api.request_timeout())?;
    Self::with_transport(transport, &config.api)
  }
}

impl<T: Transport> WaniKaniClient<T> {
  pub fn with_transport(transport: T, api: &ApiConfig) -> Result<Self> {
    // Keep a trailing slash so joins append to the versioned path
    let base = format!("{}/", api.base_url.trim_end_matches('/'));
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API base URL {}: {}", api.base_url, e))?;

    Ok(Self {
      transport,
      limiter: RateLimiter::new(api.min_request_interval()),
      retry: RetryPolicy {
        max_retries: api.max_retries,
        base_backoff: api.retry_backoff(),
      },
      base_url,
    })
  }

  #[cfg(test)]
  pub fn transport(&self) -> &T {
    &self.transport
  }

  fn paginator(&self) -> Paginator<'_, T> {
    Paginator::new(&self.transport, &self.limiter, self.retry)
  }

  fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ClientError> {
    let mut url = self
      .base_url
      .join(path)
      .map_err(|e| ClientError::fetch(path, None, format!("invalid endpoint: {}", e)))?;
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
  }

  /// Fetch every unlocked vocabulary item and join it with its subject.
  pub async fn fetch_vocabulary(&self) -> Result<(VocabularySummary, Vec<Warning>), ClientError> {
    let assignments_url = self.endpoint(
      "assignments",
      &[("subject_types", "vocabulary"), ("unlocked", "true")],
    )?;
    let subjects_url = self.endpoint("subjects", &[("types", "vocabulary")])?;

    let assignments = self.paginator().collect_all(assignments_url).await?;
    let subjects = self.paginator().collect_all(subjects_url).await?;
    info!(
      assignments = assignments.len(),
      subjects = subjects.len(),
      "fetched vocabulary records"
    );

    let normalized = normalize(subjects, assignments);
    let warnings = normalized.warnings();
    info!(
      entries = normalized.entries.len(),
      dropped = normalized.dropped,
      rejected = normalized.rejected,
      "normalized vocabulary"
    );

    Ok((
      VocabularySummary {
        entries: normalized.entries,
      },
      warnings,
    ))
  }

  /// Get the account's user record.
  pub async fn get_user(&self) -> Result<UserInfo, ClientError> {
    let url = self.endpoint("user", &[])?;
    let response: ApiUserResponse = self.paginator().fetch_document(&url, None).await?;
    Ok(response.data.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::wanikani::transport::fake::{ok, status, FakeTransport};
  use serde_json::json;

  fn api() -> ApiConfig {
    ApiConfig {
      min_request_interval_ms: 10,
      ..ApiConfig::default()
    }
  }

  #[test]
  fn test_endpoints_keep_version_prefix() {
    let client = WaniKaniClient::with_transport(FakeTransport::new(|_, _| status(500)), &api()).unwrap();
    let url = client
      .endpoint("assignments", &[("subject_types", "vocabulary"), ("unlocked", "true")])
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.wanikani.com/v2/assignments?subject_types=vocabulary&unlocked=true"
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_get_user() {
    let transport = FakeTransport::new(|url, _| {
      assert_eq!(url.path(), "/v2/user");
      ok(json!({
        "object": "user",
        "data": {
          "username": "koichi",
          "level": 12,
          "profile_url": "https://www.wanikani.com/users/koichi",
          "started_at": "2023-03-01T10:00:00.000000Z",
          "subscription": { "active": true, "type": "lifetime", "max_level_granted": 60 }
        }
      }))
    });
    let client = WaniKaniClient::with_transport(transport, &api()).unwrap();

    let user = client.get_user().await.unwrap();
    assert_eq!(user.username, "koichi");
    assert_eq!(user.level, 12);
    assert!(user.subscription.active);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_vocabulary_joins_records() {
    let transport = FakeTransport::new(|url, _| match url.path() {
      "/v2/assignments" => ok(json!({
        "pages": { "next_url": null },
        "data": [
          { "id": 10, "object": "assignment", "data": {
            "subject_id": 1, "subject_type": "vocabulary", "srs_stage": 5,
            "unlocked_at": "2024-01-01T00:00:00Z" } },
          { "id": 11, "object": "assignment", "data": {
            "subject_id": 99, "subject_type": "vocabulary", "srs_stage": 1,
            "unlocked_at": "2024-01-02T00:00:00Z" } }
        ]
      })),
      "/v2/subjects" => ok(json!({
        "pages": { "next_url": null },
        "data": [
          { "id": 1, "object": "vocabulary", "data": {
            "level": 3, "characters": "食べる",
            "meanings": [{ "meaning": "to eat", "primary": true }],
            "readings": [{ "reading": "たべる", "primary": true }],
            "parts_of_speech": ["godan_verb", "transitive_verb"] } }
        ]
      })),
      other => panic!("unexpected request to {}", other),
    });
    let client = WaniKaniClient::with_transport(transport, &api()).unwrap();

    let (summary, warnings) = client.fetch_vocabulary().await.unwrap();
    assert_eq!(summary.entries.len(), 1);
    assert_eq!(summary.entries[0].characters, "食べる");
    assert_eq!(
      warnings,
      vec![Warning::Normalization {
        dropped: 1,
        rejected: 0
      }]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_auth_failure_propagates() {
    let client =
      WaniKaniClient::with_transport(FakeTransport::new(|_, _| status(401)), &api()).unwrap();
    assert!(client.fetch_vocabulary().await.unwrap_err().is_auth());
  }
}
