//! Seed data: the subject catalog and a minimal built-in question set, so the
//! app is usable even without a configured bank or external provider.

use crate::domain::{Question, Subject};

/// The fixed subject catalog.
pub fn subjects() -> Vec<Subject> {
  vec![
    Subject { id: "math".into(), title: "Math".into(), description: "Addition, subtraction, fractions and more".into() },
    Subject { id: "hebrew".into(), title: "Hebrew".into(), description: "Reading, comprehension and grammar".into() },
    Subject { id: "science".into(), title: "Science".into(), description: "The human body, space and planet Earth".into() },
    Subject { id: "english".into(), title: "English".into(), description: "Vocabulary, reading and conversation".into() },
  ]
}

pub fn find_subject(id: &str) -> Option<Subject> {
  subjects().into_iter().find(|s| s.id == id)
}

/// Placeholder titles used when no topic list can be produced.
pub fn fallback_topics(count: usize) -> Vec<String> {
  (1..=count).map(|i| format!("Topic {}", i)).collect()
}

fn q(text: &str, options: [&str; 4], correct: usize, explanation: &str) -> Question {
  Question {
    question_text: text.into(),
    options: options.iter().map(|o| o.to_string()).collect(),
    correct_answer_index: correct,
    explanation: explanation.into(),
  }
}

/// Built-in questions per subject id. Used for practice sessions and games
/// when nothing better is available.
pub fn seed_questions(subject_id: &str) -> Vec<Question> {
  match subject_id {
    "math" => vec![
      q("7 + 5 = ?", ["11", "12", "13", "14"], 1, "7 + 5 is 12."),
      q("9 x 3 = ?", ["27", "24", "30", "21"], 0, "Nine groups of three make 27."),
      q("Which fraction is bigger?", ["1/4", "1/3", "1/5", "1/8"], 1, "Fewer equal parts means bigger parts."),
      q("20 - 8 = ?", ["14", "11", "12", "13"], 2, "20 - 8 is 12."),
    ],
    "hebrew" => vec![
      q("How many letters are in the Hebrew alphabet?", ["20", "22", "24", "26"], 1, "The alphabet has 22 letters."),
      q("Which direction is Hebrew written?", ["Left to right", "Top to bottom", "Right to left", "Bottom to top"], 2, "Hebrew is written right to left."),
      q("What is the first letter of the alphabet?", ["Bet", "Gimel", "Alef", "Dalet"], 2, "Alef comes first."),
    ],
    "science" => vec![
      q("Which planet is closest to the Sun?", ["Venus", "Mercury", "Earth", "Mars"], 1, "Mercury orbits closest to the Sun."),
      q("What do plants need to make food?", ["Sunlight", "Sand", "Salt", "Plastic"], 0, "Plants use sunlight in photosynthesis."),
      q("How many bones does an adult human have?", ["106", "156", "206", "306"], 2, "An adult skeleton has 206 bones."),
    ],
    "english" => vec![
      q("What is the opposite of 'hot'?", ["Warm", "Cold", "Big", "Fast"], 1, "Cold is the opposite of hot."),
      q("Which word is an animal?", ["Table", "Blue", "Horse", "Run"], 2, "A horse is an animal."),
      q("Choose the plural of 'child'.", ["Childs", "Childes", "Children", "Childrens"], 2, "'Children' is the irregular plural."),
    ],
    _ => vec![],
  }
}
