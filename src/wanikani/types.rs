use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Highest level a WaniKani subject can have
pub const MAX_LEVEL: u32 = 60;

/// Group name for entries that carry no part-of-speech tag
pub const UNKNOWN_PART_OF_SPEECH: &str = "unknown";

/// A learned vocabulary item, joined from its subject and assignment records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
  pub id: u64,
  pub characters: String,
  pub meanings: Vec<String>,
  pub readings: Vec<String>,
  pub primary_meaning: Option<String>,
  pub primary_reading: Option<String>,
  pub parts_of_speech: Vec<String>,
  pub srs_stage: u8,
  pub level: u32,
  pub unlocked_at: Option<DateTime<Utc>>,
  pub passed_at: Option<DateTime<Utc>>,
}

impl VocabularyEntry {
  /// First part-of-speech tag, or "unknown"
  pub fn part_of_speech(&self) -> &str {
    self
      .parts_of_speech
      .first()
      .map(String::as_str)
      .unwrap_or(UNKNOWN_PART_OF_SPEECH)
  }

  pub fn srs_bucket(&self) -> SrsBucket {
    SrsBucket::from_stage(self.srs_stage)
  }
}

/// All unlocked vocabulary of the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularySummary {
  pub entries: Vec<VocabularyEntry>,
}

/// Unlocked vocabulary of a single level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelVocabulary {
  pub level: u32,
  pub entries: Vec<VocabularyEntry>,
}

/// Entries sharing one part-of-speech tag, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartOfSpeechGroup<'a> {
  pub part_of_speech: &'a str,
  pub entries: Vec<&'a VocabularyEntry>,
}

/// Named SRS stage ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SrsBucket {
  /// Stage 0: unlocked but lessons not done
  Initiate,
  /// Stages 1-4
  Apprentice,
  /// Stages 5-6
  Guru,
  /// Stage 7
  Master,
  /// Stage 8
  Enlightened,
  /// Stage 9
  Burned,
}

impl SrsBucket {
  pub const ALL: [SrsBucket; 6] = [
    SrsBucket::Initiate,
    SrsBucket::Apprentice,
    SrsBucket::Guru,
    SrsBucket::Master,
    SrsBucket::Enlightened,
    SrsBucket::Burned,
  ];

  pub fn from_stage(stage: u8) -> Self {
    match stage {
      0 => SrsBucket::Initiate,
      1..=4 => SrsBucket::Apprentice,
      5 | 6 => SrsBucket::Guru,
      7 => SrsBucket::Master,
      8 => SrsBucket::Enlightened,
      _ => SrsBucket::Burned,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      SrsBucket::Initiate => "initiate",
      SrsBucket::Apprentice => "apprentice",
      SrsBucket::Guru => "guru",
      SrsBucket::Master => "master",
      SrsBucket::Enlightened => "enlightened",
      SrsBucket::Burned => "burned",
    }
  }
}

impl fmt::Display for SrsBucket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for SrsBucket {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    SrsBucket::ALL
      .into_iter()
      .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| {
        let names: Vec<&str> = SrsBucket::ALL.iter().map(|b| b.name()).collect();
        format!("unknown SRS bucket '{}' (expected one of: {})", s, names.join(", "))
      })
  }
}

/// Entry counts per SRS bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
  pub counts: BTreeMap<SrsBucket, usize>,
  pub total: usize,
}

impl ProgressSummary {
  pub fn count(&self, bucket: SrsBucket) -> usize {
    self.counts.get(&bucket).copied().unwrap_or(0)
  }
}

/// Account information from the `/user` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
  pub username: String,
  pub level: u32,
  pub profile_url: String,
  pub started_at: Option<DateTime<Utc>>,
  pub subscription: Subscription,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub active: bool,
  /// "free", "recurring" or "lifetime"
  pub kind: Option<String>,
  pub max_level_granted: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bucket_names_parse() {
    assert_eq!("guru".parse::<SrsBucket>(), Ok(SrsBucket::Guru));
    assert_eq!("Burned".parse::<SrsBucket>(), Ok(SrsBucket::Burned));
    assert!("expert".parse::<SrsBucket>().is_err());
  }

  #[test]
  fn test_stage_boundaries() {
    assert_eq!(SrsBucket::from_stage(0), SrsBucket::Initiate);
    assert_eq!(SrsBucket::from_stage(4), SrsBucket::Apprentice);
    assert_eq!(SrsBucket::from_stage(5), SrsBucket::Guru);
    assert_eq!(SrsBucket::from_stage(7), SrsBucket::Master);
    assert_eq!(SrsBucket::from_stage(8), SrsBucket::Enlightened);
    assert_eq!(SrsBucket::from_stage(9), SrsBucket::Burned);
  }
}
