//! Weighted combination of criterion scores.
//!
//! Weights are normalized to sum to 1 before use, so the weighted grade
//! stays on the criterion scale (0–`criterion_max`).

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::types::{Criterion, CriterionScores};

/// Tolerance used when checking that weights sum to one.
const NORMALIZED_EPSILON: f64 = 1e-9;

/// Per-criterion weights. Raw values may have any non-negative scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(alias = "weight_completeness")]
    pub completeness: f64,
    #[serde(alias = "weight_conciseness")]
    pub conciseness: f64,
    #[serde(alias = "weight_correctness")]
    pub correctness: f64,
}

impl Default for WeightConfig {
    /// Completeness 30%, conciseness 20%, correctness 50%.
    fn default() -> Self {
        Self {
            completeness: 0.3,
            conciseness: 0.2,
            correctness: 0.5,
        }
    }
}

impl WeightConfig {
    pub fn new(completeness: f64, conciseness: f64, correctness: f64) -> Self {
        Self {
            completeness,
            conciseness,
            correctness,
        }
    }

    /// Equal weight on every criterion.
    pub fn uniform() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Completeness => self.completeness,
            Criterion::Conciseness => self.conciseness,
            Criterion::Correctness => self.correctness,
        }
    }

    pub fn sum(&self) -> f64 {
        self.completeness + self.conciseness + self.correctness
    }

    /// Reject negative or non-finite weights and an all-zero configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        for criterion in Criterion::ALL {
            let value = self.get(criterion);
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidWeight {
                    criterion: criterion.as_str(),
                    value,
                });
            }
        }
        if self.sum() <= 0.0 {
            return Err(ValidationError::ZeroWeightSum);
        }
        Ok(())
    }

    /// Scale the weights so they sum to one.
    pub fn normalized(&self) -> ValidationResult<Self> {
        self.validate()?;
        let sum = self.sum();
        Ok(Self {
            completeness: self.completeness / sum,
            conciseness: self.conciseness / sum,
            correctness: self.correctness / sum,
        })
    }

    pub fn is_normalized(&self) -> bool {
        self.validate().is_ok() && (self.sum() - 1.0).abs() < NORMALIZED_EPSILON
    }
}

/// Σ(weight × criterion) with pre-normalized weights.
///
/// Re-checks normalization and fails fast rather than producing a grade on
/// a different scale.
pub fn weighted_score(scores: &CriterionScores, weights: &WeightConfig) -> ValidationResult<f64> {
    weights.validate()?;
    let sum = weights.sum();
    if (sum - 1.0).abs() >= NORMALIZED_EPSILON {
        return Err(ValidationError::UnnormalizedWeights(sum));
    }

    Ok(Criterion::ALL
        .iter()
        .map(|c| weights.get(*c) * scores.get(*c))
        .sum())
}
