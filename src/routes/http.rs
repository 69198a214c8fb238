//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, Query, State}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::logic;
use crate::progression::{ProfileView, Transition};
use crate::protocol::*;
use crate::seeds::subjects;
use crate::domain::Subject;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

// -------- Profile --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_profile(State(state): State<Arc<AppState>>) -> Json<ProfileView> {
  Json(logic::profile_view(&state).await)
}

#[instrument(level = "info", skip(state, body), fields(grade = body.grade))]
pub async fn http_post_profile(
  State(state): State<Arc<AppState>>,
  Json(body): Json<IdentityIn>,
) -> Json<Transition<bool>> {
  let t = logic::set_identity(&state, &body.name, body.grade).await;
  info!(target: "progression", updated = t.outcome, "HTTP identity set");
  Json(t)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_avatar(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AvatarIn>,
) -> Json<Transition<()>> {
  Json(logic::update_avatar(&state, &body.url).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_logout(State(state): State<Arc<AppState>>) -> Json<Transition<()>> {
  Json(logic::logout(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_achievements(State(state): State<Arc<AppState>>) -> Json<AchievementsOut> {
  Json(logic::achievements(&state).await)
}

// -------- Subjects & topics --------

#[instrument(level = "info")]
pub async fn http_get_subjects() -> Json<Vec<Subject>> {
  Json(subjects())
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_topics(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
  Query(q): Query<TopicsQuery>,
) -> ApiResult<Vec<TopicOut>> {
  let topics = logic::list_topics(&state, &subject_id, q.grade).await?;
  info!(target: "quiz", %subject_id, count = topics.len(), "HTTP topics served");
  Ok(Json(topics))
}

// -------- Quiz --------

#[instrument(level = "info", skip(state, body), fields(subject_id = %body.subject_id, topic_index = ?body.topic_index))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartQuizIn>,
) -> ApiResult<QuizOut> {
  Ok(Json(logic::start_quiz(&state, &body.subject_id, body.topic_index).await?))
}

#[instrument(level = "info", skip(state, body), fields(option = body.option))]
pub async fn http_post_quiz_answer(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<AnswerOut> {
  let out = logic::answer_quiz(&state, &session_id, body.option).await?;
  info!(target: "quiz", %session_id, accepted = out.accepted, correct = ?out.feedback.as_ref().map(|f| f.correct), "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_quiz_next(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<NextOut> {
  Ok(Json(logic::next_question(&state, &session_id).await?))
}

// -------- Chests --------

#[instrument(level = "info", skip(state, body), fields(chest_id = %body.chest_id))]
pub async fn http_post_chest_open(
  State(state): State<Arc<AppState>>,
  Json(body): Json<OpenChestIn>,
) -> ApiResult<OpenChestOut> {
  Ok(Json(logic::open_chest(&state, &body.chest_id).await?))
}

// -------- Tic-tac-toe --------

#[instrument(level = "info", skip(state, body), fields(subject_id = %body.subject_id))]
pub async fn http_post_game(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartGameIn>,
) -> ApiResult<GameOut> {
  Ok(Json(logic::start_game(&state, &body.subject_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(cell = body.cell))]
pub async fn http_post_game_cell(
  State(state): State<Arc<AppState>>,
  Path(game_id): Path<String>,
  Json(body): Json<CellIn>,
) -> ApiResult<GameOut> {
  Ok(Json(logic::select_cell(&state, &game_id, body.cell).await?))
}

#[instrument(level = "info", skip(state, body), fields(option = body.option))]
pub async fn http_post_game_answer(
  State(state): State<Arc<AppState>>,
  Path(game_id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<GameAnswerOut> {
  Ok(Json(logic::answer_game(&state, &game_id, body.option).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_game_computer(
  State(state): State<Arc<AppState>>,
  Path(game_id): Path<String>,
) -> ApiResult<ComputerOut> {
  Ok(Json(logic::computer_turn(&state, &game_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_game_reset(
  State(state): State<Arc<AppState>>,
  Path(game_id): Path<String>,
) -> ApiResult<GameOut> {
  Ok(Json(logic::restart_game(&state, &game_id).await?))
}
