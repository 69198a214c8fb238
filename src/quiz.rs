//! One quiz attempt: Loading → InProgress(index) → Finished.
//!
//! The session slices the current stage out of the topic's question set, shuffles
//! every question's options, scores answers, and on completion reports the score
//! (and, outside practice, the stage result) to the progression engine.

use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::GameRules;
use crate::domain::{ChestTier, Question};
use crate::progression::{ProgressionEngine, Transition};

/// Shuffle a question's options and re-point the correct index at the original
/// correct text. When two options share that text the first match wins; the
/// question's author has to keep option texts distinct for feedback to be exact.
pub fn shuffle_options<R: Rng + ?Sized>(q: &Question, rng: &mut R) -> Question {
  let Some(correct) = q.correct_text() else {
    warn!(target: "quiz", index = q.correct_answer_index, options = q.options.len(), "Correct index out of range; leaving question unshuffled");
    return q.clone();
  };
  if q.options.iter().filter(|o| o.as_str() == correct).count() > 1 {
    warn!(target: "quiz", question = %q.question_text, "Duplicate option text; correct index is the first match");
  }

  let mut options = q.options.clone();
  options.shuffle(rng);
  let correct_answer_index = options.iter().position(|o| o == correct).unwrap_or(q.correct_answer_index);

  Question {
    question_text: q.question_text.clone(),
    options,
    correct_answer_index,
    explanation: q.explanation.clone(),
  }
}

/// Whether the attempt counts toward topic progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuizMode {
  Topic { topic_key: String, stage: u32 },
  Practice,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizResult {
  Scored { score: u64, percentage: f64, passed: bool },
  /// The topic's stage counter is already past the last stage.
  TopicAlreadyComplete,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuizState {
  Loading,
  /// The provider had nothing for this stage.
  Unavailable,
  InProgress { index: usize },
  Finished { result: QuizResult },
}

/// Feedback for an accepted answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
  pub correct: bool,
  pub selected_index: usize,
  pub correct_index: usize,
  pub explanation: String,
  pub score: u64,
}

/// What reporting a finished session did to the profile.
pub type QuizReport = Transition<Option<ChestTier>>;

#[derive(Clone, Debug)]
pub struct QuizSession {
  mode: QuizMode,
  questions: Vec<Question>,
  selected: Vec<Option<usize>>,
  score: u64,
  state: QuizState,
  reported: bool,
  points_per_correct: u64,
  passing_score_percentage: f64,
}

impl QuizSession {
  pub fn new(mode: QuizMode, rules: &GameRules) -> Self {
    Self {
      mode,
      questions: vec![],
      selected: vec![],
      score: 0,
      state: QuizState::Loading,
      reported: false,
      points_per_correct: rules.points_per_correct,
      passing_score_percentage: rules.passing_score_percentage,
    }
  }

  pub fn mode(&self) -> &QuizMode { &self.mode }
  pub fn state(&self) -> &QuizState { &self.state }
  pub fn score(&self) -> u64 { self.score }
  pub fn question_count(&self) -> usize { self.questions.len() }

  pub fn current_index(&self) -> Option<usize> {
    match self.state {
      QuizState::InProgress { index } => Some(index),
      _ => None,
    }
  }

  pub fn current_question(&self) -> Option<&Question> {
    self.current_index().and_then(|i| self.questions.get(i))
  }

  /// Selected option for the current question, if answered.
  pub fn current_selection(&self) -> Option<usize> {
    self.current_index().and_then(|i| self.selected.get(i).copied().flatten())
  }

  /// Leave `Loading` with the full question set for the topic (or practice pool).
  /// Calls outside `Loading` are ignored.
  #[instrument(level = "debug", skip(self, all, rules, rng), fields(total = all.len()))]
  pub fn load<R: Rng + ?Sized>(&mut self, all: Vec<Question>, rules: &GameRules, rng: &mut R) {
    if self.state != QuizState::Loading {
      debug!(target: "quiz", state = ?self.state, "load ignored outside Loading");
      return;
    }

    let window: Vec<Question> = match &self.mode {
      QuizMode::Practice => all,
      QuizMode::Topic { stage, topic_key } => {
        if *stage > rules.stages_per_topic {
          info!(target: "quiz", %topic_key, stage, "Topic already complete");
          self.state = QuizState::Finished { result: QuizResult::TopicAlreadyComplete };
          return;
        }
        let per = rules.questions_per_stage;
        let start = (*stage as usize).saturating_sub(1).saturating_mul(per);
        all.into_iter().skip(start).take(per).collect()
      }
    };

    if window.is_empty() {
      warn!(target: "quiz", mode = ?self.mode, "No questions available for session");
      self.state = QuizState::Unavailable;
      return;
    }

    self.questions = window.iter().map(|q| shuffle_options(q, rng)).collect();
    self.selected = vec![None; self.questions.len()];
    self.state = QuizState::InProgress { index: 0 };
    debug!(target: "quiz", count = self.questions.len(), "Session in progress");
  }

  /// Record the answer for the current question. Only the first selection per
  /// question counts; later ones, out-of-range options and calls outside
  /// `InProgress` return None.
  #[instrument(level = "debug", skip(self))]
  pub fn select_answer(&mut self, option: usize) -> Option<AnswerFeedback> {
    let index = self.current_index()?;
    if self.selected[index].is_some() {
      debug!(target: "quiz", index, "Question already answered");
      return None;
    }
    let q = &self.questions[index];
    if option >= q.options.len() {
      warn!(target: "quiz", index, option, "Option out of range ignored");
      return None;
    }

    let correct = q.is_correct(option);
    self.selected[index] = Some(option);
    if correct {
      self.score += self.points_per_correct;
    }
    Some(AnswerFeedback {
      correct,
      selected_index: option,
      correct_index: q.correct_answer_index,
      explanation: q.explanation.clone(),
      score: self.score,
    })
  }

  /// Move past the current (answered) question. Past the last one the session
  /// finishes and the result is returned.
  #[instrument(level = "debug", skip(self))]
  pub fn advance(&mut self) -> Option<QuizResult> {
    let index = self.current_index()?;
    if self.selected[index].is_none() {
      debug!(target: "quiz", index, "Cannot advance before answering");
      return None;
    }
    if index + 1 < self.questions.len() {
      self.state = QuizState::InProgress { index: index + 1 };
      return None;
    }

    let result = self.score_result();
    info!(target: "quiz", mode = ?self.mode, result = ?result, "Quiz finished");
    self.state = QuizState::Finished { result: result.clone() };
    Some(result)
  }

  fn score_result(&self) -> QuizResult {
    let total = (self.questions.len() as u64).saturating_mul(self.points_per_correct);
    let percentage = if total > 0 { self.score as f64 * 100.0 / total as f64 } else { 0.0 };
    QuizResult::Scored {
      score: self.score,
      percentage,
      passed: percentage >= self.passing_score_percentage,
    }
  }

  /// Apply a scored result to the profile exactly once: points always, stage
  /// progress only outside practice. Returns None when there is nothing to report.
  #[instrument(level = "info", skip(self, engine))]
  pub fn report(&mut self, engine: &mut ProgressionEngine) -> Option<QuizReport> {
    if self.reported {
      return None;
    }
    let QuizState::Finished { result: QuizResult::Scored { score, passed, .. } } = self.state else {
      return None;
    };
    self.reported = true;

    let points = engine.add_points(i64::try_from(score).unwrap_or(i64::MAX));
    let mut events = points.events;
    let mut profile = points.profile;
    if let QuizMode::Topic { topic_key, stage } = &self.mode {
      let progress = engine.update_topic_progress(topic_key, *stage, passed);
      events.extend(progress.events);
      profile = progress.profile;
    }
    Some(Transition { profile, outcome: points.outcome, events })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::progression::ProgressEvent;
  use crate::store::MemoryStore;
  use rand::{rngs::StdRng, SeedableRng};
  use std::sync::Arc;

  fn q(n: usize) -> Question {
    Question {
      question_text: format!("Q{}", n),
      options: vec![format!("right{}", n), format!("a{}", n), format!("b{}", n), format!("c{}", n)],
      correct_answer_index: 0,
      explanation: format!("because {}", n),
    }
  }

  fn bank(n: usize) -> Vec<Question> {
    (0..n).map(q).collect()
  }

  fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
  }

  fn topic(stage: u32) -> QuizMode {
    QuizMode::Topic { topic_key: "math-0".into(), stage }
  }

  fn answer_all(s: &mut QuizSession, correct: usize) -> QuizResult {
    let mut n = 0;
    loop {
      let cq = s.current_question().expect("question").clone();
      let pick = if n < correct { cq.correct_answer_index } else { (cq.correct_answer_index + 1) % 4 };
      s.select_answer(pick).expect("accepted");
      n += 1;
      if let Some(r) = s.advance() {
        return r;
      }
    }
  }

  #[test]
  fn shuffle_is_a_permutation_that_tracks_the_correct_text() {
    let mut r = rng();
    for n in 0..50 {
      let original = Question { correct_answer_index: n % 4, ..q(n) };
      let shuffled = shuffle_options(&original, &mut r);
      let mut a = original.options.clone();
      let mut b = shuffled.options.clone();
      a.sort();
      b.sort();
      assert_eq!(a, b);
      assert_eq!(shuffled.correct_text(), original.correct_text());
    }
  }

  #[test]
  fn shuffle_leaves_broken_questions_alone() {
    let broken = Question { correct_answer_index: 9, ..q(1) };
    assert_eq!(shuffle_options(&broken, &mut rng()), broken);
  }

  #[test]
  fn shuffle_with_duplicate_text_still_flags_that_text() {
    let dup = Question {
      question_text: "pick".into(),
      options: vec!["same".into(), "x".into(), "same".into(), "y".into()],
      correct_answer_index: 2,
      explanation: String::new(),
    };
    let s = shuffle_options(&dup, &mut rng());
    assert_eq!(s.correct_text(), Some("same"));
  }

  #[test]
  fn topic_session_slices_its_stage_window() {
    let rules = GameRules::default();
    let mut s = QuizSession::new(topic(2), &rules);
    assert_eq!(s.state(), &QuizState::Loading);
    s.load(bank(20), &rules, &mut rng());
    assert_eq!(s.question_count(), 10);
    assert_eq!(s.current_question().expect("first").question_text, "Q10");
  }

  #[test]
  fn completed_topic_finishes_without_score() {
    let rules = GameRules::default();
    let mut s = QuizSession::new(topic(3), &rules);
    s.load(bank(20), &rules, &mut rng());
    assert_eq!(s.state(), &QuizState::Finished { result: QuizResult::TopicAlreadyComplete });
  }

  #[test]
  fn empty_content_is_unavailable_not_fatal() {
    let rules = GameRules::default();
    let mut s = QuizSession::new(QuizMode::Practice, &rules);
    s.load(vec![], &rules, &mut rng());
    assert_eq!(s.state(), &QuizState::Unavailable);
    assert_eq!(s.select_answer(0), None);
    assert_eq!(s.advance(), None);

    // stage 2 of a topic that only has 10 questions
    let mut s = QuizSession::new(topic(2), &rules);
    s.load(bank(10), &rules, &mut rng());
    assert_eq!(s.state(), &QuizState::Unavailable);
  }

  #[test]
  fn only_first_selection_counts() {
    let rules = GameRules::default();
    let mut s = QuizSession::new(QuizMode::Practice, &rules);
    s.load(bank(3), &rules, &mut rng());
    let correct = s.current_question().expect("q").correct_answer_index;
    let wrong = (correct + 1) % 4;
    let fb = s.select_answer(wrong).expect("first");
    assert!(!fb.correct);
    assert_eq!(fb.correct_index, correct);
    assert_eq!(s.select_answer(correct), None);
    assert_eq!(s.score(), 0);
    assert_eq!(s.current_selection(), Some(wrong));
  }

  #[test]
  fn cannot_advance_unanswered_or_pick_out_of_range() {
    let rules = GameRules::default();
    let mut s = QuizSession::new(QuizMode::Practice, &rules);
    s.load(bank(2), &rules, &mut rng());
    assert_eq!(s.advance(), None);
    assert_eq!(s.current_index(), Some(0));
    assert_eq!(s.select_answer(4), None);
    assert_eq!(s.current_selection(), None);
  }

  #[test]
  fn eight_of_ten_passes_at_eighty_percent() {
    let rules = GameRules::default();
    let mut s = QuizSession::new(topic(1), &rules);
    s.load(bank(20), &rules, &mut rng());
    let r = answer_all(&mut s, 8);
    assert_eq!(r, QuizResult::Scored { score: 80, percentage: 80.0, passed: true });
  }

  #[test]
  fn seven_of_ten_fails() {
    let rules = GameRules::default();
    let mut s = QuizSession::new(topic(1), &rules);
    s.load(bank(20), &rules, &mut rng());
    match answer_all(&mut s, 7) {
      QuizResult::Scored { score, passed, .. } => {
        assert_eq!(score, 70);
        assert!(!passed);
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn passing_report_adds_points_and_unlocks_next_stage_once() {
    let rules = Arc::new(GameRules::default());
    let mut engine = ProgressionEngine::load(rules.clone(), Arc::new(MemoryStore::new()));
    engine.add_points(50);

    let mut s = QuizSession::new(topic(1), &rules);
    s.load(bank(20), &rules, &mut rng());
    answer_all(&mut s, 10);
    let report = s.report(&mut engine).expect("report");
    // 50 + 100 = 150 → bronze, 50 left
    assert_eq!(report.outcome, Some(ChestTier::Bronze));
    assert_eq!(report.profile.points, 50);
    assert_eq!(report.profile.current_stage("math-0"), 2);
    assert!(report.events.contains(&ProgressEvent::StageUnlocked { topic_key: "math-0".into(), stage: 2 }));

    assert!(s.report(&mut engine).is_none());
    assert_eq!(engine.profile().points, 50);
  }

  #[test]
  fn practice_report_never_touches_topic_progress() {
    let rules = Arc::new(GameRules::default());
    let mut engine = ProgressionEngine::load(rules.clone(), Arc::new(MemoryStore::new()));
    let mut s = QuizSession::new(QuizMode::Practice, &rules);
    s.load(bank(5), &rules, &mut rng());
    answer_all(&mut s, 5);
    let report = s.report(&mut engine).expect("report");
    assert_eq!(report.profile.points, 50);
    assert!(report.profile.topic_progress.is_empty());
  }

  #[test]
  fn unfinished_session_reports_nothing() {
    let rules = Arc::new(GameRules::default());
    let mut engine = ProgressionEngine::load(rules.clone(), Arc::new(MemoryStore::new()));
    let mut s = QuizSession::new(topic(3), &rules);
    s.load(bank(20), &rules, &mut rng());
    assert!(s.report(&mut engine).is_none());
  }
}
