//! Read-only rubric store.
//!
//! Loaded once, then shared (behind `Arc`) by every concurrent scoring task
//! without locking. Two document shapes are accepted:
//!
//! ```text
//! { "questions": { "Q1": { "expected_answer": "...", "notes": "..." } } }
//! { "questions": [ { "id": "Q1", "question": "...", "expected_answer": "..." } ] }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ValidationError, ValidationResult};
use crate::types::Question;

#[derive(Debug, Deserialize)]
struct RubricDocument {
    questions: QuestionSet,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionSet {
    Keyed(BTreeMap<String, KeyedEntry>),
    Listed(Vec<ListedEntry>),
}

#[derive(Debug, Deserialize)]
struct KeyedEntry {
    expected_answer: String,
    #[serde(default, alias = "question")]
    text: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedEntry {
    id: String,
    expected_answer: String,
    #[serde(default, alias = "text")]
    question: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// Mapping from question id to [`Question`].
#[derive(Debug, Clone, Default)]
pub struct RubricStore {
    questions: HashMap<String, Question>,
}

impl RubricStore {
    /// Build a store from already-constructed questions.
    ///
    /// Fails on duplicate ids.
    pub fn from_questions(questions: impl IntoIterator<Item = Question>) -> ValidationResult<Self> {
        let mut map = HashMap::new();
        for question in questions {
            if map.contains_key(&question.id) {
                return Err(ValidationError::DuplicateRubricQuestion(question.id));
            }
            map.insert(question.id.clone(), question);
        }
        Ok(Self { questions: map })
    }

    /// Parse a rubric JSON document in either supported shape.
    pub fn from_json_str(json: &str) -> ValidationResult<Self> {
        let doc: RubricDocument = serde_json::from_str(json)
            .map_err(|e| ValidationError::MalformedRubric(e.to_string()))?;

        let questions: Vec<Question> = match doc.questions {
            QuestionSet::Keyed(entries) => entries
                .into_iter()
                .map(|(id, e)| Question {
                    id,
                    text: e.text,
                    expected_answer: e.expected_answer,
                    notes: e.notes,
                })
                .collect(),
            QuestionSet::Listed(entries) => entries
                .into_iter()
                .map(|e| Question {
                    id: e.id,
                    text: e.question,
                    expected_answer: e.expected_answer,
                    notes: e.notes,
                })
                .collect(),
        };

        let store = Self::from_questions(questions)?;
        debug!(questions = store.len(), "rubric parsed");
        Ok(store)
    }

    /// Read and parse a rubric file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rubric {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to load rubric {}", path.display()))
    }

    pub fn lookup(&self, question_id: &str) -> Option<&Question> {
        self.questions.get(question_id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
