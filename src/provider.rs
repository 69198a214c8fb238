//! Question providers. The service only sees the `QuestionProvider` trait; content
//! generation itself lives outside this crate. The bundled `BankProvider` serves
//! the TOML question bank plus the built-in seeds.

use async_trait::async_trait;
use tracing::{error, info, instrument};

use crate::config::{QuestionCfg, TopicCfg};
use crate::domain::{Question, Subject};
use crate::seeds::seed_questions;

#[async_trait]
pub trait QuestionProvider: Send + Sync {
  /// Topic titles for a subject at a grade.
  async fn generate_topics(&self, subject: &Subject, grade: u8) -> Result<Vec<String>, String>;

  /// Questions for a topic title, or a mixed practice set when `topic` is None.
  /// An empty vector means no content is available.
  async fn generate_questions(&self, subject: &Subject, topic: Option<&str>, grade: u8) -> Result<Vec<Question>, String>;
}

#[derive(Clone, Debug)]
struct BankQuestion {
  subject: String,
  topic: Option<String>,
  question: Question,
}

/// Serves configured questions and topics; falls back to seeds for practice.
#[derive(Clone, Debug, Default)]
pub struct BankProvider {
  questions: Vec<BankQuestion>,
  topics: Vec<TopicCfg>,
  practice_limit: usize,
}

impl BankProvider {
  pub fn new(questions: &[QuestionCfg], topics: &[TopicCfg], practice_limit: usize) -> Self {
    let mut bank = Vec::with_capacity(questions.len());
    for qc in questions {
      if qc.options.len() < 2 || qc.correct_answer_index >= qc.options.len() {
        error!(target: "quiz", subject = %qc.subject, question = %qc.question_text, "Skipping bank item: bad options or correct index.");
        continue;
      }
      bank.push(BankQuestion {
        subject: qc.subject.clone(),
        topic: qc.topic.clone(),
        question: Question {
          question_text: qc.question_text.clone(),
          options: qc.options.clone(),
          correct_answer_index: qc.correct_answer_index,
          explanation: qc.explanation.clone(),
        },
      });
    }
    info!(target: "quiz", bank = bank.len(), topic_lists = topics.len(), "Question bank ready");
    Self { questions: bank, topics: topics.to_vec(), practice_limit }
  }
}

#[async_trait]
impl QuestionProvider for BankProvider {
  #[instrument(level = "debug", skip(self, subject), fields(subject = %subject.id))]
  async fn generate_topics(&self, subject: &Subject, grade: u8) -> Result<Vec<String>, String> {
    // A list pinned to this grade beats a grade-less one.
    let chosen = self.topics.iter()
      .find(|t| t.subject == subject.id && t.grade == Some(grade))
      .or_else(|| self.topics.iter().find(|t| t.subject == subject.id && t.grade.is_none()));
    match chosen {
      Some(t) if !t.titles.is_empty() => Ok(t.titles.clone()),
      _ => Err(format!("no topics configured for subject '{}' grade {}", subject.id, grade)),
    }
  }

  #[instrument(level = "debug", skip(self, subject), fields(subject = %subject.id))]
  async fn generate_questions(&self, subject: &Subject, topic: Option<&str>, _grade: u8) -> Result<Vec<Question>, String> {
    let in_subject = self.questions.iter().filter(|b| b.subject == subject.id);
    let out: Vec<Question> = match topic {
      Some(title) => in_subject
        .filter(|b| b.topic.as_deref() == Some(title))
        .map(|b| b.question.clone())
        .collect(),
      None => in_subject
        .map(|b| b.question.clone())
        .chain(seed_questions(&subject.id))
        .take(self.practice_limit)
        .collect(),
    };
    Ok(out)
  }
}
