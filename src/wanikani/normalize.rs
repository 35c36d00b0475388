//! Join raw subject and assignment records into vocabulary entries.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use super::api_types::{decode, ApiAssignment, ApiSubject};
use super::types::{
  LevelVocabulary, PartOfSpeechGroup, ProgressSummary, SrsBucket, VocabularyEntry,
  VocabularySummary, UNKNOWN_PART_OF_SPEECH,
};
use crate::error::Warning;

const VOCABULARY: &str = "vocabulary";
const MAX_SRS_STAGE: u8 = 9;

/// Result of joining raw records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
  pub entries: Vec<VocabularyEntry>,
  /// Unlocked vocabulary assignments whose subject record was missing
  pub dropped: usize,
  /// Records that failed validation and were skipped
  pub rejected: usize,
}

impl Normalized {
  pub fn warnings(&self) -> Vec<Warning> {
    if self.dropped == 0 && self.rejected == 0 {
      return Vec::new();
    }
    vec![Warning::Normalization {
      dropped: self.dropped,
      rejected: self.rejected,
    }]
  }
}

/// Join subject and assignment records on subject id.
///
/// Only assignments that are unlocked and point at a vocabulary subject
/// produce entries. Entries come out in assignment order, one per subject.
pub fn normalize(subjects: Vec<Value>, assignments: Vec<Value>) -> Normalized {
  let mut rejected = 0;

  let mut subjects_by_id: HashMap<u64, ApiSubject> = HashMap::new();
  for raw in subjects {
    match validate_subject(raw) {
      Some(subject) => {
        subjects_by_id.entry(subject.id).or_insert(subject);
      }
      None => rejected += 1,
    }
  }

  let mut entries = Vec::new();
  let mut seen = HashSet::new();
  let mut dropped = 0;

  for raw in assignments {
    let Some(assignment) = validate_assignment(raw) else {
      rejected += 1;
      continue;
    };
    let data = assignment.data;
    if data.subject_type != VOCABULARY || data.unlocked_at.is_none() {
      continue;
    }
    if !seen.insert(data.subject_id) {
      debug!(subject_id = data.subject_id, "duplicate assignment ignored");
      continue;
    }

    let Some(subject) = subjects_by_id.get(&data.subject_id) else {
      warn!(
        subject_id = data.subject_id,
        assignment_id = assignment.id,
        "assignment has no vocabulary subject, dropping"
      );
      dropped += 1;
      continue;
    };

    let s = &subject.data;
    entries.push(VocabularyEntry {
      id: subject.id,
      characters: s.characters.clone().unwrap_or_default(),
      meanings: s.meanings.iter().map(|m| m.meaning.clone()).collect(),
      readings: s.readings.iter().map(|r| r.reading.clone()).collect(),
      primary_meaning: s
        .meanings
        .iter()
        .find(|m| m.primary)
        .map(|m| m.meaning.clone()),
      primary_reading: s
        .readings
        .iter()
        .find(|r| r.primary)
        .map(|r| r.reading.clone()),
      parts_of_speech: s.parts_of_speech.clone(),
      srs_stage: data.srs_stage,
      level: s.level,
      unlocked_at: data.unlocked_at,
      passed_at: data.passed_at,
    });
  }

  if rejected > 0 {
    warn!(rejected, "skipped malformed records");
  }

  Normalized {
    entries,
    dropped,
    rejected,
  }
}

fn validate_subject(raw: Value) -> Option<ApiSubject> {
  let subject: ApiSubject = match decode(raw) {
    Ok(subject) => subject,
    Err(e) => {
      debug!(error = %e, "malformed subject record");
      return None;
    }
  };

  if subject.object != VOCABULARY {
    debug!(id = subject.id, object = %subject.object, "not a vocabulary subject");
    return None;
  }
  match subject.data.characters.as_deref() {
    Some(c) if !c.is_empty() => Some(subject),
    _ => {
      debug!(id = subject.id, "vocabulary subject without characters");
      None
    }
  }
}

fn validate_assignment(raw: Value) -> Option<ApiAssignment> {
  let assignment: ApiAssignment = match decode(raw) {
    Ok(assignment) => assignment,
    Err(e) => {
      debug!(error = %e, "malformed assignment record");
      return None;
    }
  };

  if assignment.data.srs_stage > MAX_SRS_STAGE {
    debug!(id = assignment.id, stage = assignment.data.srs_stage, "srs stage out of range");
    return None;
  }
  Some(assignment)
}

// ============================================================================
// Aggregations
// ============================================================================

/// Group entries by part-of-speech tag.
///
/// Groups appear in first-seen order and keep entry order. An entry with
/// several tags is listed once in each of its groups; untagged entries go
/// to the "unknown" group.
pub fn group_by_part_of_speech(entries: &[VocabularyEntry]) -> Vec<PartOfSpeechGroup<'_>> {
  let mut groups: Vec<PartOfSpeechGroup<'_>> = Vec::new();
  let mut index: HashMap<&str, usize> = HashMap::new();

  for entry in entries {
    let mut tags: Vec<&str> = entry.parts_of_speech.iter().map(String::as_str).collect();
    if tags.is_empty() {
      tags.push(UNKNOWN_PART_OF_SPEECH);
    }

    let mut placed = HashSet::new();
    for tag in tags {
      if !placed.insert(tag) {
        continue;
      }
      let position = *index.entry(tag).or_insert_with(|| {
        groups.push(PartOfSpeechGroup {
          part_of_speech: tag,
          entries: Vec::new(),
        });
        groups.len() - 1
      });
      groups[position].entries.push(entry);
    }
  }

  groups
}

/// Entries whose level equals `level`.
pub fn filter_by_level(entries: &[VocabularyEntry], level: u32) -> Vec<VocabularyEntry> {
  entries
    .iter()
    .filter(|e| e.level == level)
    .cloned()
    .collect()
}

/// Entries whose SRS stage falls in `bucket`.
pub fn filter_by_srs_bucket(entries: &[VocabularyEntry], bucket: SrsBucket) -> Vec<VocabularyEntry> {
  entries
    .iter()
    .filter(|e| e.srs_bucket() == bucket)
    .cloned()
    .collect()
}

/// Count entries per SRS bucket. Every bucket is present, possibly with zero.
pub fn progress(entries: &[VocabularyEntry]) -> ProgressSummary {
  let mut counts: BTreeMap<SrsBucket, usize> = SrsBucket::ALL.iter().map(|b| (*b, 0)).collect();
  for entry in entries {
    *counts.entry(entry.srs_bucket()).or_default() += 1;
  }

  ProgressSummary {
    counts,
    total: entries.len(),
  }
}

impl VocabularySummary {
  pub fn by_part_of_speech(&self) -> Vec<PartOfSpeechGroup<'_>> {
    group_by_part_of_speech(&self.entries)
  }

  pub fn by_level(&self, level: u32) -> LevelVocabulary {
    LevelVocabulary {
      level,
      entries: filter_by_level(&self.entries, level),
    }
  }

  pub fn by_srs_bucket(&self, bucket: SrsBucket) -> VocabularySummary {
    VocabularySummary {
      entries: filter_by_srs_bucket(&self.entries, bucket),
    }
  }

  pub fn progress(&self) -> ProgressSummary {
    progress(&self.entries)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn subject(id: u64, characters: &str, level: u32, pos: &[&str]) -> Value {
    json!({
      "id": id,
      "object": "vocabulary",
      "data": {
        "level": level,
        "characters": characters,
        "meanings": [{ "meaning": format!("meaning {}", id), "primary": true }],
        "readings": [{ "reading": format!("reading {}", id), "primary": true }],
        "parts_of_speech": pos,
      }
    })
  }

  fn assignment(id: u64, subject_id: u64, stage: u8) -> Value {
    json!({
      "id": id,
      "object": "assignment",
      "data": {
        "subject_id": subject_id,
        "subject_type": "vocabulary",
        "srs_stage": stage,
        "unlocked_at": "2024-01-01T00:00:00.000000Z",
        "passed_at": null,
      }
    })
  }

  #[test]
  fn test_eat_example() {
    let subjects = vec![json!({
      "id": 1,
      "object": "vocabulary",
      "data": {
        "level": 3,
        "characters": "食べる",
        "meanings": [{ "meaning": "eat", "primary": true }],
        "readings": [{ "reading": "たべる", "primary": true }],
        "parts_of_speech": ["verb"],
      }
    })];
    let assignments = vec![json!({
      "id": 100,
      "object": "assignment",
      "data": {
        "subject_id": 1,
        "subject_type": "vocabulary",
        "srs_stage": 5,
        "unlocked_at": "2024-01-01T00:00:00Z",
      }
    })];

    let normalized = normalize(subjects, assignments);
    assert_eq!(normalized.dropped, 0);
    assert_eq!(normalized.entries.len(), 1);

    let entry = &normalized.entries[0];
    assert_eq!(entry.id, 1);
    assert_eq!(entry.characters, "食べる");
    assert_eq!(entry.meanings, vec!["eat"]);
    assert_eq!(entry.readings, vec!["たべる"]);
    assert_eq!(entry.part_of_speech(), "verb");
    assert_eq!(entry.srs_stage, 5);
    assert_eq!(entry.primary_reading.as_deref(), Some("たべる"));

    let summary = progress(&normalized.entries);
    assert_eq!(summary.count(SrsBucket::Guru), 1);
    assert_eq!(summary.count(SrsBucket::Apprentice), 0);
    assert_eq!(summary.total, 1);
  }

  #[test]
  fn test_missing_subjects_are_dropped_and_counted() {
    let subjects = vec![subject(1, "一", 1, &["numeral"]), subject(3, "三", 1, &["numeral"])];
    let assignments = vec![
      assignment(10, 1, 1),
      assignment(11, 2, 1),
      assignment(12, 3, 1),
      assignment(13, 4, 1),
    ];

    let normalized = normalize(subjects, assignments);
    let ids: Vec<u64> = normalized.entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(normalized.dropped, 2);
    assert_eq!(
      normalized.warnings(),
      vec![Warning::Normalization {
        dropped: 2,
        rejected: 0
      }]
    );
  }

  #[test]
  fn test_locked_and_non_vocabulary_assignments_are_ignored() {
    let subjects = vec![subject(1, "一", 1, &["numeral"])];
    let mut locked = assignment(10, 1, 0);
    locked["data"]["unlocked_at"] = Value::Null;
    let mut kanji = assignment(11, 440, 3);
    kanji["data"]["subject_type"] = json!("kanji");

    let normalized = normalize(subjects, vec![locked, kanji]);
    assert!(normalized.entries.is_empty());
    assert_eq!(normalized.dropped, 0);
    assert!(normalized.warnings().is_empty());
  }

  #[test]
  fn test_malformed_records_are_rejected() {
    let subjects = vec![
      subject(1, "一", 1, &["numeral"]),
      json!({ "id": 2, "object": "vocabulary", "data": { "characters": "二" } }),
      subject(5, "", 1, &["noun"]),
    ];
    let assignments = vec![
      assignment(10, 1, 2),
      json!({ "id": 11, "data": { "subject_type": "vocabulary" } }),
      assignment(12, 1, 42),
    ];

    let normalized = normalize(subjects, assignments);
    assert_eq!(normalized.entries.len(), 1);
    assert_eq!(normalized.rejected, 4);
  }

  #[test]
  fn test_duplicate_assignments_yield_one_entry() {
    let subjects = vec![subject(1, "一", 1, &["numeral"])];
    let normalized = normalize(subjects, vec![assignment(10, 1, 2), assignment(11, 1, 6)]);

    assert_eq!(normalized.entries.len(), 1);
    assert_eq!(normalized.entries[0].srs_stage, 2);
  }

  #[test]
  fn test_multi_tag_entry_appears_in_each_group() {
    let subjects = vec![
      subject(1, "勉強", 4, &["noun", "suru_verb"]),
      subject(2, "本", 2, &["noun"]),
    ];
    let normalized = normalize(subjects, vec![assignment(10, 1, 3), assignment(11, 2, 3)]);
    assert_eq!(normalized.entries.len(), 2);

    let groups = group_by_part_of_speech(&normalized.entries);
    let names: Vec<&str> = groups.iter().map(|g| g.part_of_speech).collect();
    assert_eq!(names, vec!["noun", "suru_verb"]);

    let noun_ids: Vec<u64> = groups[0].entries.iter().map(|e| e.id).collect();
    let suru_ids: Vec<u64> = groups[1].entries.iter().map(|e| e.id).collect();
    assert_eq!(noun_ids, vec![1, 2]);
    assert_eq!(suru_ids, vec![1]);
  }

  #[test]
  fn test_grouping_covers_every_entry() {
    let subjects = vec![
      subject(1, "一", 1, &["numeral", "noun"]),
      subject(2, "大きい", 1, &["i_adjective"]),
      subject(3, "ぜんぜん", 1, &[]),
      subject(4, "人", 1, &["noun", "suffix"]),
    ];
    let assignments = (1..=4).map(|id| assignment(10 + id, id, 1)).collect();
    let normalized = normalize(subjects, assignments);

    let groups = group_by_part_of_speech(&normalized.entries);
    let mut covered: Vec<u64> = groups
      .iter()
      .flat_map(|g| g.entries.iter().map(|e| e.id))
      .collect();
    covered.sort_unstable();
    covered.dedup();
    assert_eq!(covered, vec![1, 2, 3, 4]);

    let unknown = groups
      .iter()
      .find(|g| g.part_of_speech == UNKNOWN_PART_OF_SPEECH)
      .unwrap();
    assert_eq!(unknown.entries.len(), 1);
    assert_eq!(unknown.entries[0].id, 3);

    let total_memberships: usize = groups.iter().map(|g| g.entries.len()).sum();
    assert_eq!(total_memberships, 6);
  }

  #[test]
  fn test_filter_by_level() {
    let subjects = vec![
      subject(1, "一", 1, &["numeral"]),
      subject(2, "二", 2, &["numeral"]),
      subject(3, "三", 1, &["numeral"]),
    ];
    let assignments = (1..=3).map(|id| assignment(10 + id, id, 1)).collect();
    let summary = VocabularySummary {
      entries: normalize(subjects, assignments).entries,
    };

    let level_one = summary.by_level(1);
    assert_eq!(level_one.level, 1);
    assert_eq!(
      level_one.entries.iter().map(|e| e.id).collect::<Vec<_>>(),
      vec![1, 3]
    );
    assert!(summary.by_level(60).entries.is_empty());
  }

  #[test]
  fn test_progress_buckets() {
    let stages = [0u8, 1, 4, 5, 6, 7, 8, 9, 9];
    let subjects = (1..=stages.len() as u64)
      .map(|id| subject(id, "字", 1, &["noun"]))
      .collect();
    let assignments = stages
      .iter()
      .enumerate()
      .map(|(i, stage)| assignment(100 + i as u64, i as u64 + 1, *stage))
      .collect();

    let summary = progress(&normalize(subjects, assignments).entries);
    assert_eq!(summary.count(SrsBucket::Initiate), 1);
    assert_eq!(summary.count(SrsBucket::Apprentice), 2);
    assert_eq!(summary.count(SrsBucket::Guru), 2);
    assert_eq!(summary.count(SrsBucket::Master), 1);
    assert_eq!(summary.count(SrsBucket::Enlightened), 1);
    assert_eq!(summary.count(SrsBucket::Burned), 2);
    assert_eq!(summary.total, 9);
  }

  #[test]
  fn test_filter_by_srs_bucket() {
    let stages = [1u8, 5, 6, 9, 3];
    let subjects = (1..=stages.len() as u64)
      .map(|id| subject(id, "字", 1, &["noun"]))
      .collect();
    let assignments = stages
      .iter()
      .enumerate()
      .map(|(i, stage)| assignment(100 + i as u64, i as u64 + 1, *stage))
      .collect();
    let summary = VocabularySummary {
      entries: normalize(subjects, assignments).entries,
    };

    let guru: Vec<u64> = summary
      .by_srs_bucket(SrsBucket::Guru)
      .entries
      .iter()
      .map(|e| e.id)
      .collect();
    assert_eq!(guru, vec![2, 3]);

    let apprentice = filter_by_srs_bucket(&summary.entries, SrsBucket::Apprentice);
    assert_eq!(apprentice.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 5]);
    assert!(summary.by_srs_bucket(SrsBucket::Master).entries.is_empty());
  }
}
