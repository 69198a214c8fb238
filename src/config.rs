//! Loading service configuration (game rules, store location, local content bank) from TOML.
//!
//! See `AppConfig` and `GameRules` for expected schema. Every field has a default,
//! so an empty file (or no file at all) yields the stock rules.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::ChestTier;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub rules: GameRules,
  #[serde(default)]
  pub store: StoreCfg,
  #[serde(default)]
  pub questions: Vec<QuestionCfg>,
  #[serde(default)]
  pub topics: Vec<TopicCfg>,
}

/// Where the profile and content caches are persisted.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct StoreCfg {
  /// JSON file backing the key-value store. In-memory store when unset.
  #[serde(default)] pub path: Option<String>,
}

/// Question entry accepted in the TOML bank.
/// `topic` unset means the question only feeds practice sessions and games.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub subject: String,
  #[serde(default)] pub topic: Option<String>,
  pub question_text: String,
  pub options: Vec<String>,
  pub correct_answer_index: usize,
  #[serde(default)] pub explanation: String,
}

/// Topic titles for a subject, optionally restricted to one grade.
#[derive(Clone, Debug, Deserialize)]
pub struct TopicCfg {
  pub subject: String,
  #[serde(default)] pub grade: Option<u8>,
  pub titles: Vec<String>,
}

/// Point threshold and star range of one chest tier.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct ChestRule {
  pub tier: ChestTier,
  pub threshold: u64,
  pub min_stars: u64,
  pub max_stars: u64,
}

/// A game unlocked once the learner reaches `level`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct LevelUnlock {
  pub level: u32,
  pub game: String,
}

/// Progression constants. Defaults mirror the shipped frontend.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GameRules {
  pub stars_per_level: u64,
  pub max_level: u32,
  pub points_per_correct: u64,
  pub passing_score_percentage: f64,
  pub questions_per_stage: usize,
  pub stages_per_topic: u32,
  pub topics_per_subject: usize,
  pub questions_per_topic: usize,
  pub practice_question_count: usize,
  pub chests: Vec<ChestRule>,
  pub level_unlocks: Vec<LevelUnlock>,
  pub computer_move_delay_ms: u64,
  pub chest_reveal_delay_ms: u64,
  /// Live quiz sessions and games older than this are swept on the next insert.
  pub session_ttl_secs: u64,
}

impl Default for GameRules {
  fn default() -> Self {
    Self {
      stars_per_level: 100,
      max_level: 200,
      points_per_correct: 10,
      passing_score_percentage: 80.0,
      questions_per_stage: 10,
      stages_per_topic: 2,
      topics_per_subject: 20,
      questions_per_topic: 20,
      practice_question_count: 20,
      chests: vec![
        ChestRule { tier: ChestTier::Bronze, threshold: 100, min_stars: 10, max_stars: 25 },
        ChestRule { tier: ChestTier::Silver, threshold: 250, min_stars: 30, max_stars: 50 },
        ChestRule { tier: ChestTier::Gold, threshold: 500, min_stars: 60, max_stars: 100 },
      ],
      level_unlocks: vec![
        LevelUnlock { level: 5, game: "Memory Game".into() },
        LevelUnlock { level: 30, game: "Race Against the Clock".into() },
        LevelUnlock { level: 100, game: "Bonus Quiz".into() },
      ],
      computer_move_delay_ms: 1000,
      chest_reveal_delay_ms: 1000,
      session_ttl_secs: 3600,
    }
  }
}

impl GameRules {
  /// Stars needed to leave `level`. Never zero, so level-up loops always terminate.
  pub fn stars_for_level(&self, level: u32) -> u64 {
    u64::from(level.max(1)).saturating_mul(self.stars_per_level.max(1))
  }

  /// Chest rules ordered from the highest threshold to the lowest.
  pub fn chests_descending(&self) -> Vec<ChestRule> {
    let mut chests = self.chests.clone();
    chests.sort_by(|a, b| b.threshold.cmp(&a.threshold).then(b.tier.cmp(&a.tier)));
    chests
  }

  pub fn chest(&self, tier: ChestTier) -> Option<&ChestRule> {
    self.chests.iter().find(|c| c.tier == tier)
  }

  /// Game unlocked exactly at `level`, if any.
  pub fn unlock_at(&self, level: u32) -> Option<&str> {
    self.level_unlocks.iter().find(|u| u.level == level).map(|u| u.game.as_str())
  }

  /// All games unlocked at or below `level`, in level order.
  pub fn unlocked_games(&self, level: u32) -> Vec<String> {
    let mut unlocks: Vec<&LevelUnlock> = self.level_unlocks.iter().filter(|u| u.level <= level).collect();
    unlocks.sort_by_key(|u| u.level);
    unlocks.into_iter().map(|u| u.game.clone()).collect()
  }
}

/// Parse a TOML document into `AppConfig`.
pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Attempt to load `AppConfig` from SMARTKID_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("SMARTKID_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "smartkid_backend", %path, questions = cfg.questions.len(), "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "smartkid_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "smartkid_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_yields_stock_rules() {
    let cfg = parse_config("").expect("empty toml");
    assert_eq!(cfg.rules.stars_per_level, 100);
    assert_eq!(cfg.rules.stages_per_topic, 2);
    assert_eq!(cfg.rules.chests.len(), 3);
    assert!(cfg.store.path.is_none());
  }

  #[test]
  fn partial_rules_keep_other_defaults() {
    let cfg = parse_config(
      r#"
      [rules]
      stars_per_level = 50
      chest_reveal_delay_ms = 0

      [[rules.level_unlocks]]
      level = 2
      game = "Tic Tac Toe"

      [[questions]]
      subject = "math"
      question_text = "2 + 2 = ?"
      options = ["3", "4", "5", "6"]
      correct_answer_index = 1
      "#,
    )
    .expect("toml");
    assert_eq!(cfg.rules.stars_per_level, 50);
    assert_eq!(cfg.rules.passing_score_percentage, 80.0);
    assert_eq!(cfg.rules.chest_reveal_delay_ms, 0);
    assert_eq!(cfg.rules.session_ttl_secs, 3600);
    assert_eq!(cfg.rules.unlock_at(2), Some("Tic Tac Toe"));
    assert_eq!(cfg.questions[0].topic, None);
  }

  #[test]
  fn chests_are_ordered_highest_first() {
    let rules = GameRules::default();
    let tiers: Vec<ChestTier> = rules.chests_descending().iter().map(|c| c.tier).collect();
    assert_eq!(tiers, vec![ChestTier::Gold, ChestTier::Silver, ChestTier::Bronze]);
  }

  #[test]
  fn unlocked_games_accumulate_by_level() {
    let rules = GameRules::default();
    assert!(rules.unlocked_games(4).is_empty());
    assert_eq!(rules.unlocked_games(30), vec!["Memory Game".to_string(), "Race Against the Clock".to_string()]);
  }

  #[test]
  fn zero_stars_per_level_is_treated_as_one() {
    let rules = GameRules { stars_per_level: 0, ..GameRules::default() };
    assert_eq!(rules.stars_for_level(3), 3);
  }
}
