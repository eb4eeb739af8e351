//! Result assembly: per-participant records and the cross-participant summary.
//!
//! Pure data transforms; no I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AnswerResult, AnswerStatus, ParticipantResult};

impl ParticipantResult {
    /// Fold answer results (already in submission order) into a record.
    ///
    /// `aggregate_score` is the mean weighted score over `ok` answers;
    /// skipped and failed answers are excluded from the denominator. With no
    /// `ok` answers the aggregate is `0.0` and `graded_answers` is `0`.
    pub fn assemble(participant_id: impl Into<String>, answers: Vec<AnswerResult>) -> Self {
        let graded: Vec<f64> = answers
            .iter()
            .filter(|a| a.is_ok())
            .filter_map(|a| a.weighted_score)
            .collect();

        let aggregate_score = if graded.is_empty() {
            0.0
        } else {
            graded.iter().sum::<f64>() / graded.len() as f64
        };

        Self {
            participant_id: participant_id.into(),
            answers,
            aggregate_score,
            graded_answers: graded.len(),
        }
    }

    pub fn failed_answers(&self) -> usize {
        self.answers
            .iter()
            .filter(|a| a.status == AnswerStatus::Failed)
            .count()
    }
}

/// One participant's grade for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub participant_id: String,
    pub weighted_score: f64,
}

/// One participant's aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantGrade {
    pub participant_id: String,
    pub aggregate_score: f64,
    pub graded_answers: usize,
}

/// Flat row for downstream tabular writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub participant_id: String,
    pub question_id: String,
    pub completeness: f64,
    pub conciseness: f64,
    pub correctness: f64,
    pub score: f64,
}

/// Cross-participant summary of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Graded (`ok`) answers per question id, in participant order.
    pub per_question: BTreeMap<String, Vec<QuestionGrade>>,
    /// Aggregate per participant, in batch order.
    pub per_participant: Vec<ParticipantGrade>,
    /// Flat rows of every graded answer, in batch then submission order.
    pub rows: Vec<SummaryRow>,
}

impl BatchSummary {
    pub fn from_results(results: &[ParticipantResult]) -> Self {
        let mut summary = Self::default();

        for result in results {
            summary.per_participant.push(ParticipantGrade {
                participant_id: result.participant_id.clone(),
                aggregate_score: result.aggregate_score,
                graded_answers: result.graded_answers,
            });

            for answer in result.answers.iter().filter(|a| a.is_ok()) {
                let (Some(scores), Some(score)) = (answer.scores, answer.weighted_score) else {
                    continue;
                };
                summary
                    .per_question
                    .entry(answer.question_id.clone())
                    .or_default()
                    .push(QuestionGrade {
                        participant_id: result.participant_id.clone(),
                        weighted_score: score,
                    });
                summary.rows.push(SummaryRow {
                    participant_id: result.participant_id.clone(),
                    question_id: answer.question_id.clone(),
                    completeness: scores.completeness,
                    conciseness: scores.conciseness,
                    correctness: scores.correctness,
                    score,
                });
            }
        }

        summary
    }
}

/// Everything produced by one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub graded_at: DateTime<Utc>,
    pub results: Vec<ParticipantResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn new(results: Vec<ParticipantResult>) -> Self {
        let summary = BatchSummary::from_results(&results);
        Self {
            run_id: Uuid::new_v4(),
            graded_at: Utc::now(),
            results,
            summary,
        }
    }
}
