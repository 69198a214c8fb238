//! Application state: progression engine, content library, live sessions and games.
//!
//! This module owns:
//!   - the single progression engine (profile + store)
//!   - the content library (provider + cache)
//!   - in-memory quiz sessions, tic-tac-toe games and unopened chests, keyed by uuid
//!   - the shared random source
//!
//! Lock order is sessions/games → engine → pending chests → rng. The rng mutex is
//! never held across an await.

use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::config::{load_config_from_env, AppConfig, GameRules};
use crate::content::ContentLibrary;
use crate::domain::ChestTier;
use crate::progression::ProgressionEngine;
use crate::provider::{BankProvider, QuestionProvider};
use crate::quiz::QuizSession;
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};
use crate::tictactoe::TicTacToeGame;

/// A live quiz session or game with the instant it was created.
pub struct Live<T> {
    pub created_at: Instant,
    pub inner: T,
}

impl<T> Live<T> {
    pub fn new(inner: T) -> Self {
        Self { created_at: Instant::now(), inner }
    }
}

impl<T> Deref for Live<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for Live<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// Drop entries older than `ttl`, then insert. Returns how many were swept.
fn sweep_and_insert<T>(map: &mut HashMap<String, Live<T>>, ttl: Duration, id: String, value: T) -> usize {
    let before = map.len();
    map.retain(|_, live| live.created_at.elapsed() < ttl);
    let swept = before - map.len();
    map.insert(id, Live::new(value));
    swept
}

pub struct AppState {
    pub rules: Arc<GameRules>,
    pub engine: RwLock<ProgressionEngine>,
    pub content: ContentLibrary,
    pub quizzes: RwLock<HashMap<String, Live<QuizSession>>>,
    pub games: RwLock<HashMap<String, Live<TicTacToeGame>>>,
    /// Chests earned but not opened yet: chest id -> tier.
    pub pending_chests: RwLock<HashMap<String, ChestTier>>,
    rng: Mutex<StdRng>,
}

impl AppState {
    /// Build state from env: load config, open the store, build the provider, load the profile.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_config_from_env().unwrap_or_default();

        let store_path = std::env::var("SMARTKID_STORE_PATH").ok().or_else(|| cfg.store.path.clone());
        let store: Arc<dyn KeyValueStore> = match store_path {
            Some(path) => match JsonFileStore::open(&path) {
                Ok(s) => Arc::new(s),
                Err(e) => {
                    error!(target: "store", %path, error = %e, "Cannot open store file; progress will not survive restarts");
                    Arc::new(MemoryStore::new())
                }
            },
            None => {
                info!(target: "store", "No store path configured; using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let provider = Arc::new(BankProvider::new(&cfg.questions, &cfg.topics, cfg.rules.practice_question_count));
        Self::from_parts(cfg, store, provider, StdRng::from_entropy())
    }

    /// Assemble state from explicit collaborators.
    pub fn from_parts(
        cfg: AppConfig,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn QuestionProvider>,
        rng: StdRng,
    ) -> Self {
        let rules = Arc::new(cfg.rules);
        let engine = ProgressionEngine::load(rules.clone(), store.clone());
        let content = ContentLibrary::new(provider, store, rules.clone());
        Self {
            rules,
            engine: RwLock::new(engine),
            content,
            quizzes: RwLock::new(HashMap::new()),
            games: RwLock::new(HashMap::new()),
            pending_chests: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.rules.session_ttl_secs)
    }

    /// Register a quiz session, sweeping abandoned ones first.
    pub async fn insert_quiz(&self, id: String, session: QuizSession) {
        let swept = sweep_and_insert(&mut *self.quizzes.write().await, self.session_ttl(), id, session);
        if swept > 0 {
            debug!(target: "quiz", swept, "Expired quiz sessions dropped");
        }
    }

    /// Register a game, sweeping abandoned ones first.
    pub async fn insert_game(&self, id: String, game: TicTacToeGame) {
        let swept = sweep_and_insert(&mut *self.games.write().await, self.session_ttl(), id, game);
        if swept > 0 {
            debug!(target: "game", swept, "Expired games dropped");
        }
    }

    /// Exclusive access to the shared random source. Keep the guard out of awaits.
    pub fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
