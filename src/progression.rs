//! Progression engine: stars → levels, points → chests, per-topic stage unlocking.
//!
//! The engine owns the single `UserProfile`, persists it after every mutation and
//! returns the events each transition produced instead of notifying anyone itself.
//! Nothing here fails: bad amounts are clamped to zero, stale stage reports are
//! ignored, and store errors are logged.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::GameRules;
use crate::domain::{ChestTier, UserProfile};
use crate::rng::random_int;
use crate::store::{load_json, save_json, KeyValueStore};

/// Store key of the serialized profile.
pub const PROFILE_KEY: &str = "smartkid-user";

/// Something the caller may want to surface to the learner.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
  LevelUp { level: u32 },
  GameUnlocked { level: u32, game: String },
  ChestUnlocked { tier: ChestTier },
  StageUnlocked { topic_key: String, stage: u32 },
  TopicCompleted { topic_key: String },
  LoggedOut,
}

/// Result of one engine operation: the profile after it, the operation's own value,
/// and the events it emitted (in order).
#[derive(Clone, Debug, Serialize)]
pub struct Transition<T> {
  pub profile: UserProfile,
  pub outcome: T,
  pub events: Vec<ProgressEvent>,
}

/// Read-only projection used by the profile screen.
#[derive(Clone, Debug, Serialize)]
pub struct ProfileView {
  pub profile: UserProfile,
  pub stars_to_next_level: u64,
  pub unlocked_games: Vec<String>,
}

pub struct ProgressionEngine {
  rules: Arc<GameRules>,
  store: Arc<dyn KeyValueStore>,
  profile: UserProfile,
}

fn clamp_amount(amount: i64, op: &'static str) -> u64 {
  if amount < 0 {
    warn!(target: "progression", %op, amount, "Negative amount clamped to zero");
    0
  } else {
    amount as u64
  }
}

impl ProgressionEngine {
  /// Load the persisted profile, or start from defaults on first use.
  #[instrument(level = "info", skip_all)]
  pub fn load(rules: Arc<GameRules>, store: Arc<dyn KeyValueStore>) -> Self {
    let mut profile = load_json::<UserProfile>(store.as_ref(), PROFILE_KEY).unwrap_or_default();
    if profile.level == 0 {
      warn!(target: "progression", "Stored profile had level 0; raising to 1");
      profile.level = 1;
    }
    info!(target: "progression", level = profile.level, stars = profile.stars, points = profile.points, "Profile loaded");
    let mut engine = Self { rules, store, profile };
    // A record written under different rules may violate the level invariant.
    let events = engine.settle_levels();
    if !events.is_empty() {
      engine.persist();
    }
    engine
  }

  pub fn profile(&self) -> &UserProfile {
    &self.profile
  }

  pub fn rules(&self) -> &GameRules {
    &self.rules
  }

  pub fn view(&self) -> ProfileView {
    ProfileView {
      profile: self.profile.clone(),
      stars_to_next_level: self.rules.stars_for_level(self.profile.level),
      unlocked_games: self.rules.unlocked_games(self.profile.level),
    }
  }

  fn persist(&self) {
    if let Err(e) = save_json(self.store.as_ref(), PROFILE_KEY, &self.profile) {
      error!(target: "progression", error = %e, "Failed to persist profile");
    }
  }

  fn transition<T>(&self, outcome: T, events: Vec<ProgressEvent>) -> Transition<T> {
    Transition { profile: self.profile.clone(), outcome, events }
  }

  /// Convert surplus stars into levels, one level per iteration.
  fn settle_levels(&mut self) -> Vec<ProgressEvent> {
    let mut events = vec![];
    loop {
      let required = self.rules.stars_for_level(self.profile.level);
      if self.profile.stars < required {
        break;
      }
      self.profile.stars -= required;
      self.profile.level += 1;
      let level = self.profile.level;
      info!(target: "progression", level, "Level up");
      events.push(ProgressEvent::LevelUp { level });
      if let Some(game) = self.rules.unlock_at(level) {
        info!(target: "progression", level, %game, "Game unlocked");
        events.push(ProgressEvent::GameUnlocked { level, game: game.to_string() });
      }
    }
    events
  }

  /// Add stars and level up as many times as the total allows.
  #[instrument(level = "info", skip(self))]
  pub fn add_stars(&mut self, amount: i64) -> Transition<()> {
    let amount = clamp_amount(amount, "add_stars");
    self.profile.stars = self.profile.stars.saturating_add(amount);
    let events = self.settle_levels();
    self.persist();
    self.transition((), events)
  }

  /// Add points and award at most one chest: the highest tier whose threshold the
  /// new total meets. Only that tier's threshold is deducted; the remainder is not
  /// checked again against lower tiers in the same call.
  #[instrument(level = "info", skip(self))]
  pub fn add_points(&mut self, amount: i64) -> Transition<Option<ChestTier>> {
    let amount = clamp_amount(amount, "add_points");
    self.profile.points = self.profile.points.saturating_add(amount);

    let mut events = vec![];
    let mut awarded = None;
    let points = self.profile.points;
    let best = self.rules.chests_descending().into_iter().find(|c| points >= c.threshold);
    if let Some(chest) = best {
      self.profile.points -= chest.threshold;
      awarded = Some(chest.tier);
      info!(target: "progression", tier = ?chest.tier, remaining = self.profile.points, "Chest unlocked");
      events.push(ProgressEvent::ChestUnlocked { tier: chest.tier });
    }
    self.persist();
    self.transition(awarded, events)
  }

  /// Uniform star reward inside the tier's configured range. Unknown tiers roll 0.
  pub fn roll_chest_stars<R: Rng + ?Sized>(&self, tier: ChestTier, rng: &mut R) -> u64 {
    match self.rules.chest(tier) {
      Some(c) => random_int(rng, c.min_stars, c.max_stars),
      None => {
        warn!(target: "progression", ?tier, "No rule configured for chest tier");
        0
      }
    }
  }

  /// Advance a topic by one stage when `stage` is the stage currently unlocked and it
  /// was passed. Any other report (failed, stale, replayed, topic finished) is a no-op.
  #[instrument(level = "info", skip(self))]
  pub fn update_topic_progress(&mut self, topic_key: &str, stage: u32, passed: bool) -> Transition<bool> {
    let current = self.profile.current_stage(topic_key);
    let stages = self.rules.stages_per_topic;

    if !passed || stage != current || current > stages {
      debug!(target: "progression", %topic_key, stage, current, passed, "Stage report ignored");
      return self.transition(false, vec![]);
    }

    let next = current + 1;
    self.profile.topic_progress.insert(topic_key.to_string(), next);
    let event = if current < stages {
      ProgressEvent::StageUnlocked { topic_key: topic_key.to_string(), stage: next }
    } else {
      ProgressEvent::TopicCompleted { topic_key: topic_key.to_string() }
    };
    info!(target: "progression", %topic_key, stage = next, "Topic progress advanced");
    self.persist();
    self.transition(true, vec![event])
  }

  /// Onboarding: set the learner's name and grade. Blank names are ignored.
  #[instrument(level = "info", skip(self, name))]
  pub fn set_identity(&mut self, name: &str, grade: u8) -> Transition<bool> {
    let name = name.trim();
    if name.is_empty() {
      debug!(target: "progression", "Blank name ignored");
      return self.transition(false, vec![]);
    }
    self.profile.name = name.to_string();
    self.profile.grade = grade.clamp(1, 12);
    self.persist();
    self.transition(true, vec![])
  }

  #[instrument(level = "info", skip(self, url))]
  pub fn update_avatar(&mut self, url: &str) -> Transition<()> {
    self.profile.avatar_url = Some(url.to_string());
    self.persist();
    self.transition((), vec![])
  }

  /// Reset to the default profile and drop the persisted record.
  #[instrument(level = "info", skip(self))]
  pub fn logout(&mut self) -> Transition<()> {
    self.profile = UserProfile::default();
    if let Err(e) = self.store.remove(PROFILE_KEY) {
      error!(target: "progression", error = %e, "Failed to remove persisted profile");
    }
    info!(target: "progression", "Logged out");
    self.transition((), vec![ProgressEvent::LoggedOut])
  }
}
