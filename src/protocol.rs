//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::domain::{ChestTier, Question};
use crate::progression::Transition;
use crate::quiz::{AnswerFeedback, QuizMode, QuizReport, QuizResult, QuizSession, QuizState};
use crate::tictactoe::{GameOutcome, Mark, MoveResult, TicTacToeGame};

/// Question as shown to the learner: no correct index, no explanation.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub question_text: String,
    pub options: Vec<String>,
}

impl From<&Question> for QuestionOut {
    fn from(q: &Question) -> Self {
        Self { question_text: q.question_text.clone(), options: q.options.clone() }
    }
}

//
// Profile
//

#[derive(Deserialize)]
pub struct IdentityIn {
    pub name: String,
    pub grade: u8,
}

#[derive(Deserialize)]
pub struct AvatarIn {
    pub url: String,
}

#[derive(Serialize)]
pub struct ChestOut {
    pub tier: ChestTier,
    pub icon: &'static str,
    pub threshold: u64,
    pub min_stars: u64,
    pub max_stars: u64,
}

#[derive(Serialize)]
pub struct AchievementsOut {
    pub level: u32,
    pub max_level: u32,
    pub goal: String,
    pub completed_topics: usize,
    pub total_topics: usize,
    pub completion_percentage: u32,
    pub chests: Vec<ChestOut>,
}

//
// Subjects & topics
//

#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
    pub grade: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct TopicOut {
    pub index: usize,
    pub title: String,
    pub topic_key: String,
    pub stage: u32,
    pub stages_per_topic: u32,
    pub completed: bool,
    pub locked: bool,
    pub progress_percentage: f64,
}

//
// Quiz
//

#[derive(Debug, Deserialize)]
pub struct StartQuizIn {
    pub subject_id: String,
    /// Topic index; omitted for a practice session.
    #[serde(default)]
    pub topic_index: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub session_id: String,
    pub mode: QuizMode,
    pub state: QuizState,
    pub question_count: usize,
    pub score: u64,
    pub question: Option<QuestionOut>,
    pub selected: Option<usize>,
}

impl QuizOut {
    pub fn new(session_id: &str, s: &QuizSession) -> Self {
        Self {
            session_id: session_id.to_string(),
            mode: s.mode().clone(),
            state: s.state().clone(),
            question_count: s.question_count(),
            score: s.score(),
            question: s.current_question().map(QuestionOut::from),
            selected: s.current_selection(),
        }
    }
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub option: usize,
}

#[derive(Serialize)]
pub struct AnswerOut {
    /// False when the selection was ignored (already answered, out of range, not in progress).
    pub accepted: bool,
    pub feedback: Option<AnswerFeedback>,
    pub quiz: QuizOut,
}

#[derive(Serialize)]
pub struct NextOut {
    pub quiz: QuizOut,
    pub result: Option<QuizResult>,
    pub report: Option<QuizReport>,
    /// Id to pass to `/chest/open` when the report awarded a chest.
    pub chest_id: Option<String>,
}

//
// Chests
//

#[derive(Deserialize)]
pub struct OpenChestIn {
    pub chest_id: String,
}

#[derive(Serialize)]
pub struct OpenChestOut {
    pub tier: ChestTier,
    pub stars_won: u64,
    pub transition: Transition<()>,
}

//
// Tic-tac-toe
//

#[derive(Debug, Deserialize)]
pub struct StartGameIn {
    pub subject_id: String,
}

#[derive(Serialize)]
pub struct PendingOut {
    pub cell: usize,
    pub question: QuestionOut,
}

#[derive(Serialize)]
pub struct GameOut {
    pub game_id: String,
    pub board: Vec<Option<Mark>>,
    pub player_turn: bool,
    pub outcome: Option<GameOutcome>,
    pub pending: Option<PendingOut>,
    pub has_questions: bool,
}

impl GameOut {
    pub fn new(game_id: &str, g: &TicTacToeGame) -> Self {
        Self {
            game_id: game_id.to_string(),
            board: g.board().to_vec(),
            player_turn: g.is_player_turn(),
            outcome: g.outcome(),
            pending: g.pending().map(|p| PendingOut { cell: p.cell, question: QuestionOut::from(&p.question) }),
            has_questions: g.has_questions(),
        }
    }
}

#[derive(Deserialize)]
pub struct CellIn {
    pub cell: usize,
}

#[derive(Serialize)]
pub struct GameAnswerOut {
    pub result: Option<MoveResult>,
    pub game: GameOut,
}

#[derive(Serialize)]
pub struct ComputerOut {
    pub cell: Option<usize>,
    pub game: GameOut,
}

//
// Misc
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    #[error("unknown quiz session: {0}")]
    UnknownSession(String),
    #[error("unknown game: {0}")]
    UnknownGame(String),
    #[error("unknown or already opened chest: {0}")]
    UnknownChest(String),
    #[error("topic is locked until the previous one is completed: {0}")]
    TopicLocked(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::TopicLocked(_) => StatusCode::CONFLICT,
            _ => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Serialize)]
struct ErrorOut {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(ErrorOut { error: self.to_string() })).into_response()
    }
}
