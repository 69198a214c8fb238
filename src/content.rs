//! Content library: provider calls fronted by the key-value store cache.
//!
//! Cache keys:
//!   - `topics-{subject}-{grade}`
//!   - `quiz-{subject}-{topicIndex}` / `quiz-practice-{subject}`
//!   - `tictactoe-questions-{subject}`
//!
//! Empty or failed provider results are never cached, so a later call can retry.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::GameRules;
use crate::domain::{Question, QuizTopic, Subject};
use crate::provider::QuestionProvider;
use crate::seeds::fallback_topics;
use crate::store::{load_json, save_json, KeyValueStore};

#[derive(Clone)]
pub struct ContentLibrary {
  provider: Arc<dyn QuestionProvider>,
  store: Arc<dyn KeyValueStore>,
  rules: Arc<GameRules>,
}

fn cache<T: serde::Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
  if let Err(e) = save_json(store, key, value) {
    error!(target: "store", %key, error = %e, "Failed to cache content");
  }
}

impl ContentLibrary {
  pub fn new(provider: Arc<dyn QuestionProvider>, store: Arc<dyn KeyValueStore>, rules: Arc<GameRules>) -> Self {
    Self { provider, store, rules }
  }

  /// Topic titles for a subject; numbered placeholders if the provider has none.
  #[instrument(level = "info", skip(self, subject), fields(subject = %subject.id))]
  pub async fn topics(&self, subject: &Subject, grade: u8) -> Vec<String> {
    let key = format!("topics-{}-{}", subject.id, grade);
    if let Some(titles) = load_json::<Vec<String>>(self.store.as_ref(), &key) {
      debug!(target: "quiz", %key, "Topics served from cache");
      return titles;
    }
    match self.provider.generate_topics(subject, grade).await {
      Ok(titles) if !titles.is_empty() => {
        cache(self.store.as_ref(), &key, &titles);
        titles
      }
      Ok(_) => {
        warn!(target: "quiz", %key, "Provider returned no topics; using placeholders");
        fallback_topics(self.rules.topics_per_subject)
      }
      Err(e) => {
        warn!(target: "quiz", %key, error = %e, "Topic generation failed; using placeholders");
        fallback_topics(self.rules.topics_per_subject)
      }
    }
  }

  /// Full question set behind a quiz (every stage of a topic, or the practice pool).
  #[instrument(level = "info", skip(self, subject), fields(subject = %subject.id))]
  pub async fn quiz_questions(&self, subject: &Subject, topic: &QuizTopic, grade: u8) -> Vec<Question> {
    let key = match topic {
      QuizTopic::Practice => format!("quiz-practice-{}", subject.id),
      QuizTopic::Topic(i) => format!("quiz-{}-{}", subject.id, i),
    };
    if let Some(qs) = self.cached(&key) {
      return qs;
    }
    let title = match topic {
      QuizTopic::Practice => None,
      QuizTopic::Topic(i) => {
        let titles = self.topics(subject, grade).await;
        Some(titles.get(*i).cloned().unwrap_or_else(|| format!("Topic {}", i + 1)))
      }
    };
    self.generate(&key, subject, title.as_deref(), grade).await
  }

  /// Pool of questions gating tic-tac-toe moves.
  #[instrument(level = "info", skip(self, subject), fields(subject = %subject.id))]
  pub async fn game_questions(&self, subject: &Subject, grade: u8) -> Vec<Question> {
    let key = format!("tictactoe-questions-{}", subject.id);
    if let Some(qs) = self.cached(&key) {
      return qs;
    }
    self.generate(&key, subject, None, grade).await
  }

  fn cached(&self, key: &str) -> Option<Vec<Question>> {
    let qs = load_json::<Vec<Question>>(self.store.as_ref(), key)?;
    debug!(target: "quiz", %key, count = qs.len(), "Questions served from cache");
    Some(qs)
  }

  async fn generate(&self, key: &str, subject: &Subject, title: Option<&str>, grade: u8) -> Vec<Question> {
    match self.provider.generate_questions(subject, title, grade).await {
      Ok(qs) if !qs.is_empty() => {
        info!(target: "quiz", %key, count = qs.len(), "Questions generated");
        cache(self.store.as_ref(), key, &qs);
        qs
      }
      Ok(_) => {
        warn!(target: "quiz", %key, "No content available");
        vec![]
      }
      Err(e) => {
        error!(target: "quiz", %key, error = %e, "Question generation failed; no content available");
        vec![]
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::find_subject;
  use crate::store::MemoryStore;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Counts provider calls; fails topics, returns `n` questions per call.
  struct Counting {
    calls: AtomicUsize,
    n: usize,
  }

  #[async_trait]
  impl QuestionProvider for Counting {
    async fn generate_topics(&self, _s: &Subject, _g: u8) -> Result<Vec<String>, String> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Err("offline".into())
    }

    async fn generate_questions(&self, _s: &Subject, topic: Option<&str>, _g: u8) -> Result<Vec<Question>, String> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok((0..self.n)
        .map(|i| Question {
          question_text: format!("{}:{}", topic.unwrap_or("practice"), i),
          options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
          correct_answer_index: 0,
          explanation: String::new(),
        })
        .collect())
    }
  }

  fn library(n: usize) -> (ContentLibrary, Arc<Counting>, Arc<MemoryStore>) {
    let provider = Arc::new(Counting { calls: AtomicUsize::new(0), n });
    let store = Arc::new(MemoryStore::new());
    let lib = ContentLibrary::new(provider.clone(), store.clone(), Arc::new(GameRules::default()));
    (lib, provider, store)
  }

  #[tokio::test]
  async fn failed_topics_fall_back_and_are_not_cached() {
    let (lib, provider, store) = library(3);
    let math = find_subject("math").expect("math");
    let titles = lib.topics(&math, 3).await;
    assert_eq!(titles.len(), 20);
    assert_eq!(titles[0], "Topic 1");
    assert_eq!(store.get("topics-math-3").expect("get"), None);
    lib.topics(&math, 3).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn quiz_questions_are_cached_per_topic_index() {
    let (lib, provider, store) = library(3);
    let math = find_subject("math").expect("math");
    let first = lib.quiz_questions(&math, &QuizTopic::Topic(1), 3).await;
    assert_eq!(first[0].question_text, "Topic 2:0");
    let calls = provider.calls.load(Ordering::SeqCst);

    let again = lib.quiz_questions(&math, &QuizTopic::Topic(1), 3).await;
    assert_eq!(again, first);
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls);
    assert!(store.get("quiz-math-1").expect("get").is_some());
  }

  #[tokio::test]
  async fn empty_results_are_not_cached() {
    let (lib, provider, store) = library(0);
    let math = find_subject("math").expect("math");
    assert!(lib.game_questions(&math, 3).await.is_empty());
    assert!(lib.game_questions(&math, 3).await.is_empty());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.get("tictactoe-questions-math").expect("get"), None);
  }

  #[tokio::test]
  async fn practice_uses_its_own_key() {
    let (lib, _, store) = library(2);
    let math = find_subject("math").expect("math");
    let qs = lib.quiz_questions(&math, &QuizTopic::Practice, 3).await;
    assert_eq!(qs[0].question_text, "practice:0");
    assert!(store.get("quiz-practice-math").expect("get").is_some());
  }
}
