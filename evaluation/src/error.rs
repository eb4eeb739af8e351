//! Validation error taxonomy.
//!
//! Every error here is fatal for the request that produced it and is raised
//! before any scoring begins. Per-answer failures (oracle exhaustion, missing
//! questions) are never represented as errors at this level; they become
//! [`AnswerStatus`](crate::types::AnswerStatus) tags instead.

use thiserror::Error;

/// Request-level validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A weight is negative, NaN or infinite.
    #[error("Invalid weight for {criterion}: {value}")]
    InvalidWeight { criterion: &'static str, value: f64 },

    /// All raw weights are zero, so normalization would divide by zero.
    #[error("Weights sum to zero; at least one criterion must carry weight")]
    ZeroWeightSum,

    /// Weights handed to the calculator are not normalized.
    #[error("Weights are not normalized: sum is {0}")]
    UnnormalizedWeights(f64),

    /// The same question id appears twice in one submission.
    #[error("Duplicate question id '{question_id}' in submission from '{participant_id}'")]
    DuplicateQuestion {
        participant_id: String,
        question_id: String,
    },

    /// The same question id appears twice in a rubric document.
    #[error("Duplicate question id '{0}' in rubric")]
    DuplicateRubricQuestion(String),

    #[error("self_consistency_runs must be at least 1, got {0}")]
    InvalidSelfConsistencyRuns(usize),

    #[error("max_concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("min_usable_samples must be between 1 and self_consistency_runs ({runs}), got {got}")]
    InvalidMinSamples { got: usize, runs: usize },

    #[error("criterion_max must be a positive finite number, got {0}")]
    InvalidCriterionMax(f64),

    /// Aggregation was asked to reduce an empty sample list.
    #[error("No samples to aggregate")]
    EmptySamples,

    /// The rubric document could not be parsed.
    #[error("Malformed rubric: {0}")]
    MalformedRubric(String),
}

/// Result type for validation-checked operations.
pub type ValidationResult<T> = Result<T, ValidationError>;
