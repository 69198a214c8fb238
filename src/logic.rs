//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - profile reads/writes and the achievements summary
//!   - topic listing with stage/lock state
//!   - quiz session lifecycle (start → answer → next → report)
//!   - chest opening with the reveal delay
//!   - tic-tac-toe lifecycle (start → cell → answer → computer turn)

use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{topic_key, QuizTopic, Subject};
use crate::progression::{ProfileView, Transition};
use crate::protocol::*;
use crate::quiz::{QuizMode, QuizSession, QuizState};
use crate::seeds::{find_subject, subjects};
use crate::state::AppState;
use crate::tictactoe::TicTacToeGame;

fn subject_or_err(subject_id: &str) -> Result<Subject, ApiError> {
  find_subject(subject_id).ok_or_else(|| ApiError::UnknownSubject(subject_id.to_string()))
}

// -------- Profile --------

pub async fn profile_view(state: &AppState) -> ProfileView {
  state.engine.read().await.view()
}

#[instrument(level = "info", skip(state, name), fields(name_len = name.len()))]
pub async fn set_identity(state: &AppState, name: &str, grade: u8) -> Transition<bool> {
  state.engine.write().await.set_identity(name, grade)
}

#[instrument(level = "info", skip(state, url))]
pub async fn update_avatar(state: &AppState, url: &str) -> Transition<()> {
  state.engine.write().await.update_avatar(url)
}

/// Reset the profile and drop everything tied to the old learner.
#[instrument(level = "info", skip(state))]
pub async fn logout(state: &AppState) -> Transition<()> {
  state.quizzes.write().await.clear();
  state.games.write().await.clear();
  state.pending_chests.write().await.clear();
  state.engine.write().await.logout()
}

pub async fn achievements(state: &AppState) -> AchievementsOut {
  let engine = state.engine.read().await;
  let rules = engine.rules();
  let profile = engine.profile();

  let total_topics = subjects().len() * rules.topics_per_subject;
  let completed_topics = profile.completed_topics(rules.stages_per_topic);
  let completion_percentage = if total_topics == 0 {
    0
  } else {
    (completed_topics as f64 / total_topics as f64 * 100.0).round() as u32
  };

  let mut chests: Vec<ChestOut> = rules
    .chests
    .iter()
    .map(|c| ChestOut { tier: c.tier, icon: c.tier.icon(), threshold: c.threshold, min_stars: c.min_stars, max_stars: c.max_stars })
    .collect();
  chests.sort_by_key(|c| c.threshold);

  AchievementsOut {
    level: profile.level,
    max_level: rules.max_level,
    goal: format!("Reach level {} and complete every topic!", rules.max_level),
    completed_topics,
    total_topics,
    completion_percentage,
    chests,
  }
}

// -------- Topics --------

/// Topics of a subject with per-topic stage state. A topic is locked until the
/// one before it is completed; the first topic is always open.
#[instrument(level = "info", skip(state))]
pub async fn list_topics(state: &AppState, subject_id: &str, grade: Option<u8>) -> Result<Vec<TopicOut>, ApiError> {
  let subject = subject_or_err(subject_id)?;
  let (profile, stages) = {
    let engine = state.engine.read().await;
    (engine.profile().clone(), engine.rules().stages_per_topic)
  };
  let grade = grade.unwrap_or(profile.grade);
  let titles = state.content.topics(&subject, grade).await;

  let out = titles
    .into_iter()
    .enumerate()
    .map(|(index, title)| {
      let key = topic_key(&subject.id, index);
      let stage = profile.current_stage(&key);
      let completed = stage > stages;
      let locked = index > 0 && !profile.is_topic_completed(&topic_key(&subject.id, index - 1), stages);
      let progress_percentage = if completed || stages == 0 {
        100.0
      } else {
        f64::from(stage - 1) / f64::from(stages) * 100.0
      };
      TopicOut { index, title, topic_key: key, stage, stages_per_topic: stages, completed, locked, progress_percentage }
    })
    .collect();
  Ok(out)
}

// -------- Quiz --------

#[instrument(level = "info", skip(state))]
pub async fn start_quiz(state: &AppState, subject_id: &str, topic_index: Option<usize>) -> Result<QuizOut, ApiError> {
  let subject = subject_or_err(subject_id)?;
  let topic = match topic_index {
    Some(i) => QuizTopic::Topic(i),
    None => QuizTopic::Practice,
  };

  let (grade, mode) = {
    let engine = state.engine.read().await;
    let profile = engine.profile();
    let mode = match topic {
      QuizTopic::Topic(i) => {
        // same rule as the topic list: topic i opens once topic i-1 is completed
        if i > 0 && !profile.is_topic_completed(&topic_key(&subject.id, i - 1), engine.rules().stages_per_topic) {
          return Err(ApiError::TopicLocked(topic_key(&subject.id, i)));
        }
        let key = topic_key(&subject.id, i);
        let stage = profile.current_stage(&key);
        QuizMode::Topic { topic_key: key, stage }
      }
      QuizTopic::Practice => QuizMode::Practice,
    };
    (profile.grade, mode)
  };

  let mut session = QuizSession::new(mode, &state.rules);
  let questions = state.content.quiz_questions(&subject, &topic, grade).await;
  {
    let mut rng = state.rng();
    session.load(questions, &state.rules, &mut *rng);
  }

  let session_id = Uuid::new_v4().to_string();
  let out = QuizOut::new(&session_id, &session);
  info!(target: "quiz", %session_id, subject = %subject.id, mode = ?session.mode(), state = ?session.state(), "Quiz session started");
  // Unavailable and already-complete sessions can never advance; only playable ones are kept.
  if matches!(session.state(), QuizState::InProgress { .. }) {
    state.insert_quiz(session_id, session).await;
  }
  Ok(out)
}

#[instrument(level = "info", skip(state))]
pub async fn answer_quiz(state: &AppState, session_id: &str, option: usize) -> Result<AnswerOut, ApiError> {
  let mut quizzes = state.quizzes.write().await;
  let session = quizzes.get_mut(session_id).ok_or_else(|| ApiError::UnknownSession(session_id.to_string()))?;
  let feedback = session.select_answer(option);
  Ok(AnswerOut { accepted: feedback.is_some(), feedback, quiz: QuizOut::new(session_id, session) })
}

/// Advance the session; on finishing, report to the progression engine and park
/// any awarded chest until it is opened. Finished sessions are dropped.
#[instrument(level = "info", skip(state))]
pub async fn next_question(state: &AppState, session_id: &str) -> Result<NextOut, ApiError> {
  let mut quizzes = state.quizzes.write().await;
  let session = quizzes.get_mut(session_id).ok_or_else(|| ApiError::UnknownSession(session_id.to_string()))?;

  let result = session.advance();
  let mut report = None;
  let mut chest_id = None;
  if result.is_some() {
    let mut engine = state.engine.write().await;
    let mut pending = state.pending_chests.write().await;
    // the chest is parked under the same guards that deduct its points
    report = session.report(&mut engine);
    if let Some(tier) = report.as_ref().and_then(|r| r.outcome) {
      let id = Uuid::new_v4().to_string();
      pending.insert(id.clone(), tier);
      chest_id = Some(id);
    }
  }

  let quiz = QuizOut::new(session_id, session);
  if result.is_some() {
    quizzes.remove(session_id);
  }
  Ok(NextOut { quiz, result, report, chest_id })
}

// -------- Chests --------

/// Claim the chest, roll and credit its stars in one step, then wait out the
/// reveal before answering. Dropping the request during the reveal keeps the stars.
#[instrument(level = "info", skip(state))]
pub async fn open_chest(state: &AppState, chest_id: &str) -> Result<OpenChestOut, ApiError> {
  let (tier, stars_won, transition) = {
    let mut engine = state.engine.write().await;
    let mut pending = state.pending_chests.write().await;
    let tier = pending.remove(chest_id).ok_or_else(|| ApiError::UnknownChest(chest_id.to_string()))?;
    let stars_won = {
      let mut rng = state.rng();
      engine.roll_chest_stars(tier, &mut *rng)
    };
    let transition = engine.add_stars(i64::try_from(stars_won).unwrap_or(i64::MAX));
    (tier, stars_won, transition)
  };
  info!(target: "progression", %chest_id, ?tier, stars_won, "Chest opened");

  tokio::time::sleep(Duration::from_millis(state.rules.chest_reveal_delay_ms)).await;
  Ok(OpenChestOut { tier, stars_won, transition })
}

// -------- Tic-tac-toe --------

#[instrument(level = "info", skip(state))]
pub async fn start_game(state: &AppState, subject_id: &str) -> Result<GameOut, ApiError> {
  let subject = subject_or_err(subject_id)?;
  let grade = state.engine.read().await.profile().grade;
  let pool = state.content.game_questions(&subject, grade).await;
  if pool.is_empty() {
    warn!(target: "game", subject = %subject.id, "Starting game without questions");
  }

  let game = TicTacToeGame::new(pool);
  let game_id = Uuid::new_v4().to_string();
  let out = GameOut::new(&game_id, &game);
  state.insert_game(game_id, game).await;
  Ok(out)
}

#[instrument(level = "info", skip(state))]
pub async fn select_cell(state: &AppState, game_id: &str, cell: usize) -> Result<GameOut, ApiError> {
  let mut games = state.games.write().await;
  let game = games.get_mut(game_id).ok_or_else(|| ApiError::UnknownGame(game_id.to_string()))?;
  {
    let mut rng = state.rng();
    game.select_cell(cell, &mut *rng);
  }
  Ok(GameOut::new(game_id, game))
}

#[instrument(level = "info", skip(state))]
pub async fn answer_game(state: &AppState, game_id: &str, option: usize) -> Result<GameAnswerOut, ApiError> {
  let mut games = state.games.write().await;
  let game = games.get_mut(game_id).ok_or_else(|| ApiError::UnknownGame(game_id.to_string()))?;
  let result = game.submit_answer(option);
  Ok(GameAnswerOut { result, game: GameOut::new(game_id, game) })
}

/// Computer move after the pacing delay. No-op when it is not the computer's turn.
#[instrument(level = "info", skip(state))]
pub async fn computer_turn(state: &AppState, game_id: &str) -> Result<ComputerOut, ApiError> {
  if !state.games.read().await.contains_key(game_id) {
    return Err(ApiError::UnknownGame(game_id.to_string()));
  }
  tokio::time::sleep(Duration::from_millis(state.rules.computer_move_delay_ms)).await;

  let mut games = state.games.write().await;
  let game = games.get_mut(game_id).ok_or_else(|| ApiError::UnknownGame(game_id.to_string()))?;
  let cell = {
    let mut rng = state.rng();
    game.computer_turn(&mut *rng)
  };
  Ok(ComputerOut { cell, game: GameOut::new(game_id, game) })
}

#[instrument(level = "info", skip(state))]
pub async fn restart_game(state: &AppState, game_id: &str) -> Result<GameOut, ApiError> {
  let mut games = state.games.write().await;
  let game = games.get_mut(game_id).ok_or_else(|| ApiError::UnknownGame(game_id.to_string()))?;
  game.reset();
  Ok(GameOut::new(game_id, game))
}
