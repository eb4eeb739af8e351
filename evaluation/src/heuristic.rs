//! Deterministic token-overlap scoring.
//!
//! Used when no oracle is configured and as the fast path in tests. Never
//! suspends, never fails, always yields exactly one sample.
//!
//! | Criterion    | Formula                                                 |
//! |--------------|---------------------------------------------------------|
//! | completeness | unique expected tokens found in answer / unique expected |
//! | conciseness  | 1 if answer no longer than expected, else exp_len/ans_len |
//! | correctness  | Jaccard similarity of the unique token sets             |
//!
//! Each ratio is scaled to `[0, max]` and rounded to two decimals.

use std::collections::BTreeSet;

use crate::types::{CriterionScores, ScoredSample};

/// Lowercased whitespace tokens with surrounding ASCII punctuation removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Score `answer` against `expected` on a `[0, max]` scale.
pub fn score(expected: &str, answer: &str, max: f64) -> ScoredSample {
    let exp_list = tokenize(expected);
    let ans_list = tokenize(answer);
    let exp: BTreeSet<&str> = exp_list.iter().map(String::as_str).collect();
    let ans: BTreeSet<&str> = ans_list.iter().map(String::as_str).collect();

    let shared = exp.intersection(&ans).count();

    let completeness = if exp.is_empty() {
        max
    } else {
        shared as f64 / exp.len() as f64 * max
    };

    let conciseness = if ans_list.is_empty() {
        0.0
    } else {
        let ratio = exp_list.len() as f64 / ans_list.len() as f64;
        if ratio >= 1.0 {
            max
        } else {
            ratio * max
        }
    };

    let union = exp.union(&ans).count();
    let correctness = if union == 0 {
        max
    } else {
        shared as f64 / union as f64 * max
    };

    let scores = CriterionScores::new(
        round2(completeness),
        round2(conciseness),
        round2(correctness),
        max,
    );

    ScoredSample::new(scores).with_comment(comment(&exp, &ans))
}

fn comment(exp: &BTreeSet<&str>, ans: &BTreeSet<&str>) -> String {
    let missing: Vec<&str> = exp.difference(ans).copied().collect();
    let extra: Vec<&str> = ans.difference(exp).copied().collect();

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Missing: {}", missing.join(", ")));
    }
    if !extra.is_empty() {
        parts.push(format!("Extra: {}", extra.join(", ")));
    }
    if parts.is_empty() {
        "Good answer".to_string()
    } else {
        parts.join("; ")
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
