//! Rubric Evaluation Library
//!
//! Deterministic half of the grading engine. Everything here is synchronous
//! and side-effect free so it can be shared across concurrent scoring tasks.
//!
//! - `types`: questions, submissions, criterion scores and result records
//! - `rubric`: read-only question store
//! - `heuristic`: token-overlap scoring that needs no oracle
//! - `consistency`: per-criterion median over self-consistency samples
//! - `weighting`: weight normalization and the weighted grade
//! - `report`: participant records and the cross-participant summary
//! - `retry`: back-off arithmetic for oracle retries

#![allow(clippy::uninlined_format_args)]

pub mod consistency;
pub mod error;
pub mod heuristic;
pub mod report;
pub mod retry;
pub mod rubric;
pub mod types;
pub mod weighting;

pub use consistency::{aggregate, aggregate_samples, median, Consensus};
pub use error::{ValidationError, ValidationResult};
pub use report::{BatchReport, BatchSummary, ParticipantGrade, QuestionGrade, SummaryRow};
pub use retry::RetryPolicy;
pub use rubric::RubricStore;
pub use types::{
    AnswerResult, AnswerStatus, Criterion, CriterionScores, ParticipantResult, Question,
    ScoredSample, Submission, SubmittedAnswer, DEFAULT_CRITERION_MAX,
};
pub use weighting::{weighted_score, WeightConfig};
