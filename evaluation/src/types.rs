//! Core data model shared by the scoring pipeline.
//!
//! ```text
//! Submission ──► AnswerResult (one per answer, same order) ──► ParticipantResult
//!                   ▲
//!   Question ───────┘  (looked up in the RubricStore)
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Default upper bound of every criterion (reference rubric uses 0–5).
pub const DEFAULT_CRITERION_MAX: f64 = 5.0;

// ── Rubric side ──────────────────────────────────────────────────────────────

/// One rubric entry. Immutable after the rubric is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique question identifier (e.g. `"Q1"`).
    pub id: String,
    /// Question text shown to participants, rendered into oracle prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Reference answer the submission is compared against.
    pub expected_answer: String,
    /// Optional scoring guidance for graders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, expected_answer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: None,
            expected_answer: expected_answer.into(),
            notes: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

// ── Submission side ──────────────────────────────────────────────────────────

/// A single submitted answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: String,
    #[serde(default)]
    pub answer: String,
}

/// All answers from one participant, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub participant_id: String,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

impl Submission {
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            answers: Vec::new(),
        }
    }

    /// Builder-style helper used heavily by tests and the CLI.
    pub fn with_answer(mut self, question_id: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.push(SubmittedAnswer {
            question_id: question_id.into(),
            answer: answer.into(),
        });
        self
    }

    /// Reject submissions whose answer list repeats a question id.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut seen = HashSet::with_capacity(self.answers.len());
        for answer in &self.answers {
            if !seen.insert(answer.question_id.as_str()) {
                return Err(ValidationError::DuplicateQuestion {
                    participant_id: self.participant_id.clone(),
                    question_id: answer.question_id.clone(),
                });
            }
        }
        Ok(())
    }
}

// ── Scores ───────────────────────────────────────────────────────────────────

/// The three independently scored dimensions of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    Completeness,
    Conciseness,
    Correctness,
}

impl Criterion {
    pub const ALL: [Criterion; 3] = [
        Criterion::Completeness,
        Criterion::Conciseness,
        Criterion::Correctness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Conciseness => "conciseness",
            Self::Correctness => "correctness",
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-criterion scores, each within `[0, criterion_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionScores {
    pub completeness: f64,
    pub conciseness: f64,
    pub correctness: f64,
}

impl CriterionScores {
    /// Build scores, clamping each value into `[0, max]`.
    ///
    /// Non-finite values are treated as `0.0`.
    pub fn new(completeness: f64, conciseness: f64, correctness: f64, max: f64) -> Self {
        Self {
            completeness: clamp_score(completeness, max),
            conciseness: clamp_score(conciseness, max),
            correctness: clamp_score(correctness, max),
        }
    }

    /// Re-clamp every value into `[0, max]`.
    pub fn clamped(self, max: f64) -> Self {
        Self::new(self.completeness, self.conciseness, self.correctness, max)
    }

    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Completeness => self.completeness,
            Criterion::Conciseness => self.conciseness,
            Criterion::Correctness => self.correctness,
        }
    }

    pub fn set(&mut self, criterion: Criterion, value: f64) {
        match criterion {
            Criterion::Completeness => self.completeness = value,
            Criterion::Conciseness => self.conciseness = value,
            Criterion::Correctness => self.correctness = value,
        }
    }

    /// Whether every value already lies within `[0, max]`.
    pub fn within(&self, max: f64) -> bool {
        Criterion::ALL
            .iter()
            .all(|c| (0.0..=max).contains(&self.get(*c)))
    }
}

fn clamp_score(value: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, max)
    } else {
        0.0
    }
}

/// One raw scoring sample as produced by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSample {
    pub scores: CriterionScores,
    /// Free-text rationale, if the scorer produced one.
    pub comment: Option<String>,
}

impl ScoredSample {
    pub fn new(scores: CriterionScores) -> Self {
        Self {
            scores,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

/// Outcome tag of one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerStatus {
    Ok,
    SkippedMissingQuestion,
    Failed,
}

impl std::fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::SkippedMissingQuestion => write!(f, "skipped-missing-question"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Scored result for one submitted answer.
///
/// Either fully computed (`Ok`, scores and weighted score present) or tagged
/// with a reason and no scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question_id: String,
    #[serde(flatten)]
    pub scores: Option<CriterionScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_score: Option<f64>,
    pub status: AnswerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Number of samples that went into `scores`.
    #[serde(default)]
    pub samples_used: usize,
}

impl AnswerResult {
    pub fn ok(
        question_id: impl Into<String>,
        scores: CriterionScores,
        weighted_score: f64,
        samples_used: usize,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            scores: Some(scores),
            weighted_score: Some(weighted_score),
            status: AnswerStatus::Ok,
            reason: None,
            comment: None,
            samples_used,
        }
    }

    pub fn skipped_missing_question(question_id: impl Into<String>) -> Self {
        let question_id = question_id.into();
        Self {
            reason: Some(format!("question '{question_id}' is not in the rubric")),
            question_id,
            scores: None,
            weighted_score: None,
            status: AnswerStatus::SkippedMissingQuestion,
            comment: None,
            samples_used: 0,
        }
    }

    pub fn failed(question_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            scores: None,
            weighted_score: None,
            status: AnswerStatus::Failed,
            reason: Some(reason.into()),
            comment: None,
            samples_used: 0,
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == AnswerStatus::Ok
    }
}

/// All answer results for one participant plus their aggregate grade.
///
/// Built by `ParticipantResult::assemble` in the report module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantResult {
    pub participant_id: String,
    pub answers: Vec<AnswerResult>,
    /// Mean weighted score over `ok` answers; `0.0` when there are none.
    pub aggregate_score: f64,
    /// Number of `ok` answers behind `aggregate_score`.
    pub graded_answers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_clamped_into_bounds() {
        let s = CriterionScores::new(7.5, -1.0, 3.0, 5.0);
        assert_eq!(s.completeness, 5.0);
        assert_eq!(s.conciseness, 0.0);
        assert_eq!(s.correctness, 3.0);
        assert!(s.within(5.0));
    }

    #[test]
    fn test_scores_non_finite_become_zero() {
        let s = CriterionScores::new(f64::NAN, f64::INFINITY, 2.0, 5.0);
        assert_eq!(s.completeness, 0.0);
        assert_eq!(s.conciseness, 0.0);
    }

    #[test]
    fn test_scores_respect_configured_bound() {
        let s = CriterionScores::new(8.0, 12.0, 3.0, 10.0);
        assert_eq!(s.completeness, 8.0);
        assert_eq!(s.conciseness, 10.0);
        assert!(!s.within(5.0));
    }

    #[test]
    fn test_submission_duplicate_rejected() {
        let sub = Submission::new("TeamA")
            .with_answer("Q1", "a")
            .with_answer("Q2", "b")
            .with_answer("Q1", "c");
        match sub.validate() {
            Err(ValidationError::DuplicateQuestion { question_id, .. }) => {
                assert_eq!(question_id, "Q1")
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn test_submission_unique_ok() {
        let sub = Submission::new("TeamA")
            .with_answer("Q1", "a")
            .with_answer("Q2", "b");
        assert!(sub.validate().is_ok());
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&AnswerStatus::SkippedMissingQuestion).unwrap();
        assert_eq!(json, "\"skipped-missing-question\"");
        assert_eq!(AnswerStatus::Ok.to_string(), "ok");
    }

    #[test]
    fn test_answer_result_flattens_scores() {
        let result = AnswerResult::ok("Q1", CriterionScores::new(4.0, 3.0, 5.0, 5.0), 4.3, 1);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["question_id"], "Q1");
        assert_eq!(value["completeness"], 4.0);
        assert_eq!(value["weighted_score"], 4.3);
        assert_eq!(value["status"], "ok");
        assert!(value.get("reason").is_none());
    }

    #[test]
    fn test_failed_result_has_no_scores() {
        let result = AnswerResult::failed("Q2", "timeout");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value.get("completeness").is_none());
        assert!(value.get("weighted_score").is_none());
        assert_eq!(value["reason"], "timeout");
    }

    #[test]
    fn test_submission_parses_without_answers() {
        let sub: Submission = serde_json::from_str(r#"{"participant_id": "TeamB"}"#).unwrap();
        assert!(sub.answers.is_empty());
    }
}
