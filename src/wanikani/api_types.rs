//! Serde-deserializable types matching WaniKani API responses.
//!
//! These types are separate from domain types so raw records are validated
//! at the normalization boundary instead of leaking loosely-typed maps.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use super::types::{Subscription, UserInfo};

/// Decode a raw record into a typed struct.
pub fn decode<T: DeserializeOwned>(value: Value) -> serde_json::Result<T> {
  serde_json::from_value(value)
}

// ============================================================================
// Collections and pagination
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCollection {
  #[serde(default)]
  pub data: Vec<Value>,
  #[serde(default)]
  pub pages: ApiPages,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiPages {
  pub next_url: Option<String>,
}

/// Body of an error response, e.g. `{"error": "Unauthorized. Nice try.", "code": 401}`
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub error: String,
}

// ============================================================================
// Resources
// ============================================================================

/// Common envelope of a single resource
#[derive(Debug, Deserialize)]
pub struct ApiResource<D> {
  pub id: u64,
  pub object: String,
  pub data: D,
}

pub type ApiSubject = ApiResource<ApiSubjectData>;
pub type ApiAssignment = ApiResource<ApiAssignmentData>;

#[derive(Debug, Deserialize)]
pub struct ApiSubjectData {
  pub level: u32,
  // Null for image-only radicals, always present for vocabulary
  pub characters: Option<String>,
  #[serde(default)]
  pub meanings: Vec<ApiMeaning>,
  #[serde(default)]
  pub readings: Vec<ApiReading>,
  #[serde(default)]
  pub parts_of_speech: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMeaning {
  pub meaning: String,
  #[serde(default)]
  pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiReading {
  pub reading: String,
  #[serde(default)]
  pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiAssignmentData {
  pub subject_id: u64,
  pub subject_type: String,
  #[serde(default)]
  pub srs_stage: u8,
  pub unlocked_at: Option<DateTime<Utc>>,
  pub passed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// User endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUserResponse {
  pub data: ApiUser,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub username: String,
  pub level: u32,
  #[serde(default)]
  pub profile_url: String,
  pub started_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub subscription: ApiSubscription,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSubscription {
  #[serde(default)]
  pub active: bool,
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub max_level_granted: Option<u32>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiUser> for UserInfo {
  fn from(user: ApiUser) -> Self {
    UserInfo {
      username: user.username,
      level: user.level,
      profile_url: user.profile_url,
      started_at: user.started_at,
      subscription: Subscription {
        active: user.subscription.active,
        kind: user.subscription.kind,
        max_level_granted: user.subscription.max_level_granted,
      },
    }
  }
}
