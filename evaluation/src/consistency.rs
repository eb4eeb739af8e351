//! Self-consistency aggregation.
//!
//! Reduces the independent samples drawn for one answer to a single
//! [`CriterionScores`] by taking the median of each criterion separately.
//! Values are sorted before the middle is read, so the result does not
//! depend on the order in which samples arrived.

use crate::error::{ValidationError, ValidationResult};
use crate::types::{Criterion, CriterionScores, ScoredSample};

/// Aggregated view of a sample list.
#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    pub scores: CriterionScores,
    /// Comment of the sample closest to the consensus scores.
    pub comment: Option<String>,
    pub samples_used: usize,
}

/// Median of a list; the mean of the two middle values for even lengths.
///
/// Returns `None` for an empty list.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Per-criterion median across `samples`.
pub fn aggregate(samples: &[CriterionScores]) -> ValidationResult<CriterionScores> {
    if samples.is_empty() {
        return Err(ValidationError::EmptySamples);
    }

    let mut out = CriterionScores {
        completeness: 0.0,
        conciseness: 0.0,
        correctness: 0.0,
    };
    for criterion in Criterion::ALL {
        let column: Vec<f64> = samples.iter().map(|s| s.get(criterion)).collect();
        // Non-empty, checked above.
        out.set(criterion, median(&column).unwrap_or_default());
    }
    Ok(out)
}

/// Aggregate scored samples and pick a representative comment.
///
/// The comment comes from the sample with the smallest total absolute
/// distance to the consensus; ties go to the earliest sample.
pub fn aggregate_samples(samples: &[ScoredSample]) -> ValidationResult<Consensus> {
    let scores: Vec<CriterionScores> = samples.iter().map(|s| s.scores).collect();
    let consensus = aggregate(&scores)?;

    let comment = samples
        .iter()
        .filter(|s| s.comment.is_some())
        .map(|s| (distance(&s.scores, &consensus), s))
        .fold(None::<(f64, &ScoredSample)>, |best, (d, s)| match best {
            Some((bd, _)) if bd <= d => best,
            _ => Some((d, s)),
        })
        .and_then(|(_, s)| s.comment.clone());

    Ok(Consensus {
        scores: consensus,
        comment,
        samples_used: samples.len(),
    })
}

fn distance(a: &CriterionScores, b: &CriterionScores) -> f64 {
    Criterion::ALL
        .iter()
        .map(|c| (a.get(*c) - b.get(*c)).abs())
        .sum()
}
