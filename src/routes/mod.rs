//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Profile
        .route("/api/v1/profile", get(http::http_get_profile).post(http::http_post_profile))
        .route("/api/v1/profile/avatar", post(http::http_post_avatar))
        .route("/api/v1/logout", post(http::http_post_logout))
        .route("/api/v1/achievements", get(http::http_get_achievements))
        // Content
        .route("/api/v1/subjects", get(http::http_get_subjects))
        .route("/api/v1/subjects/:subject_id/topics", get(http::http_get_topics))
        // Quiz
        .route("/api/v1/quiz", post(http::http_post_quiz))
        .route("/api/v1/quiz/:session_id/answer", post(http::http_post_quiz_answer))
        .route("/api/v1/quiz/:session_id/next", post(http::http_post_quiz_next))
        .route("/api/v1/chest/open", post(http::http_post_chest_open))
        // Tic-tac-toe
        .route("/api/v1/games/tictactoe", post(http::http_post_game))
        .route("/api/v1/games/:game_id/cell", post(http::http_post_game_cell))
        .route("/api/v1/games/:game_id/answer", post(http::http_post_game_answer))
        .route("/api/v1/games/:game_id/computer", post(http::http_post_game_computer))
        .route("/api/v1/games/:game_id/reset", post(http::http_post_game_reset))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, GameRules};
    use crate::provider::BankProvider;
    use crate::store::MemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let cfg = AppConfig {
            rules: GameRules { chest_reveal_delay_ms: 0, computer_move_delay_ms: 0, ..GameRules::default() },
            ..AppConfig::default()
        };
        let provider = Arc::new(BankProvider::new(&cfg.questions, &cfg.topics, cfg.rules.practice_question_count));
        let state = AppState::from_parts(cfg, Arc::new(MemoryStore::new()), provider, StdRng::seed_from_u64(1));
        build_router(Arc::new(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).expect("request")).await.expect("response");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_and_subjects() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        let (_, body) = call(&app, Method::GET, "/api/v1/subjects", None).await;
        let ids: Vec<&str> = body.as_array().expect("array").iter().filter_map(|s| s["id"].as_str()).collect();
        assert_eq!(ids, vec!["math", "hebrew", "science", "english"]);
    }

    #[tokio::test]
    async fn onboarding_updates_the_profile() {
        let app = app();
        let (status, body) = call(&app, Method::POST, "/api/v1/profile", Some(json!({ "name": "  Noa ", "grade": 4 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], json!(true));

        let (_, body) = call(&app, Method::GET, "/api/v1/profile", None).await;
        assert_eq!(body["profile"]["name"], json!("Noa"));
        assert_eq!(body["profile"]["grade"], json!(4));
        assert_eq!(body["stars_to_next_level"], json!(100));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let app = app();
        let (status, body) = call(&app, Method::POST, "/api/v1/quiz/missing/next", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().expect("error").contains("missing"));

        let (status, _) = call(&app, Method::GET, "/api/v1/subjects/history/topics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::POST, "/api/v1/chest/open", Some(json!({ "chest_id": "nope" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn locked_topic_is_a_conflict() {
        let app = app();
        let (status, body) = call(&app, Method::POST, "/api/v1/quiz", Some(json!({ "subject_id": "math", "topic_index": 3 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().expect("error").contains("math-3"));
    }

    #[tokio::test]
    async fn practice_quiz_over_http() {
        let app = app();
        let (status, quiz) = call(&app, Method::POST, "/api/v1/quiz", Some(json!({ "subject_id": "hebrew" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(quiz["mode"]["kind"], json!("practice"));
        assert_eq!(quiz["question_count"], json!(3));
        let id = quiz["session_id"].as_str().expect("id").to_string();

        let mut finished = Value::Null;
        for _ in 0..3 {
            let (_, ans) = call(&app, Method::POST, &format!("/api/v1/quiz/{}/answer", id), Some(json!({ "option": 0 }))).await;
            assert_eq!(ans["accepted"], json!(true));
            let (_, next) = call(&app, Method::POST, &format!("/api/v1/quiz/{}/next", id), None).await;
            finished = next;
        }
        assert_eq!(finished["result"]["status"], json!("scored"));
        assert!(finished["report"].is_object());

        // finished sessions are dropped
        let (status, _) = call(&app, Method::POST, &format!("/api/v1/quiz/{}/next", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tictactoe_start_and_pick() {
        let app = app();
        let (status, game) = call(&app, Method::POST, "/api/v1/games/tictactoe", Some(json!({ "subject_id": "math" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(game["player_turn"], json!(true));
        let id = game["game_id"].as_str().expect("id").to_string();

        let (_, game) = call(&app, Method::POST, &format!("/api/v1/games/{}/cell", id), Some(json!({ "cell": 8 }))).await;
        assert_eq!(game["pending"]["cell"], json!(8));
        assert_eq!(game["pending"]["question"]["options"].as_array().map(Vec::len), Some(4));
    }
}
