//! Domain models used by the backend: subjects, questions, chest tiers and the user profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A learning subject shown on the home screen.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
  pub id: String,
  pub title: String,
  pub description: String,
}

/// One multiple-choice question. Field names match the cached JSON layout
/// (`questionText`, `correctAnswerIndex`) so cached sets stay readable by the frontend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub question_text: String,
  pub options: Vec<String>,
  pub correct_answer_index: usize,
  #[serde(default)] pub explanation: String,
}

impl Question {
  /// Text of the correct option, if the index is in range.
  pub fn correct_text(&self) -> Option<&str> {
    self.options.get(self.correct_answer_index).map(String::as_str)
  }

  pub fn is_correct(&self, option: usize) -> bool {
    option == self.correct_answer_index
  }
}

/// Reward brackets, ordered low to high.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChestTier {
  Bronze,
  Silver,
  Gold,
}

impl ChestTier {
  pub fn icon(self) -> &'static str {
    match self {
      ChestTier::Bronze => "🥉",
      ChestTier::Silver => "🥈",
      ChestTier::Gold => "🥇",
    }
  }
}

/// Which question set a quiz draws from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizTopic {
  /// Topic by its index inside the subject's topic list.
  Topic(usize),
  /// Mixed questions across the whole subject; never affects stage progress.
  Practice,
}

/// Key of a topic inside `UserProfile::topic_progress`.
pub fn topic_key(subject_id: &str, topic_index: usize) -> String {
  format!("{}-{}", subject_id, topic_index)
}

/// Persistent learner state. Serialized as one JSON record in the key-value store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
  pub name: String,
  pub grade: u8,
  pub avatar_url: Option<String>,
  pub level: u32,
  pub stars: u64,
  pub points: u64,
  /// topic key -> currently unlocked stage (stage > stages_per_topic means completed)
  pub topic_progress: BTreeMap<String, u32>,
}

impl Default for UserProfile {
  fn default() -> Self {
    Self {
      name: String::new(),
      grade: 3,
      avatar_url: None,
      level: 1,
      stars: 0,
      points: 0,
      topic_progress: BTreeMap::new(),
    }
  }
}

impl UserProfile {
  /// Currently unlocked stage for a topic; topics never played start at stage 1.
  pub fn current_stage(&self, key: &str) -> u32 {
    self.topic_progress.get(key).copied().unwrap_or(1)
  }

  /// True once the topic's stage counter has moved past the last stage.
  pub fn is_topic_completed(&self, key: &str, stages_per_topic: u32) -> bool {
    self.current_stage(key) > stages_per_topic
  }

  pub fn completed_topics(&self, stages_per_topic: u32) -> usize {
    self.topic_progress.values().filter(|s| **s > stages_per_topic).count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn profile_reads_cached_camel_case_json() {
    let raw = r#"{"name":"Noa","grade":4,"avatarUrl":null,"level":2,"stars":15,"points":40,"topicProgress":{"math-0":3}}"#;
    let p: UserProfile = serde_json::from_str(raw).expect("profile");
    assert_eq!(p.level, 2);
    assert_eq!(p.current_stage("math-0"), 3);
    assert_eq!(p.current_stage("math-1"), 1);
    assert!(p.is_topic_completed("math-0", 2));
    assert_eq!(p.completed_topics(2), 1);
  }

  #[test]
  fn missing_fields_fall_back_to_defaults() {
    let p: UserProfile = serde_json::from_str(r#"{"name":"Dan"}"#).expect("profile");
    assert_eq!(p.level, 1);
    assert_eq!(p.grade, 3);
    assert!(p.topic_progress.is_empty());
  }

  #[test]
  fn topic_key_joins_subject_and_index() {
    assert_eq!(topic_key("science", 7), "science-7");
  }
}
