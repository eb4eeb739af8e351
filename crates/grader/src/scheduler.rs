//! Evaluation scheduler: bounded fan-out of answer tasks.
//!
//! ```text
//! run(submission)
//!   validate                                  (fatal, before any work)
//!   loop:
//!     spawn answer tasks while in-flight < max_concurrency and not stopped
//!     select:
//!       task finished      → slot[index] = result
//!       deadline elapsed   → stop spawning
//!       cancel requested   → stop spawning
//!   in-flight tasks drain; unstarted answers → failed(timeout | cancelled)
//!   ParticipantResult::assemble(slots in submission order)
//! ```
//!
//! Each answer task runs strategy → aggregation → weighting and always
//! yields an `AnswerResult`; its failure never touches sibling answers.
//! Results land in a slot indexed by submission position, so completion
//! order never leaks into output order. The coordinating task is the only
//! writer of the slots.
//!
//! The strategy is rebound to the scheduler's configuration at
//! construction, so K, the retry budget and the oracle call ceiling are
//! always the scheduler's. Oracle calls are capped by the sampling
//! strategy's shared semaphore, which spans every answer and every
//! submission in a batch.

use std::sync::Arc;

use evaluation::{
    aggregate_samples, weighted_score, AnswerResult, BatchReport, ParticipantResult, RubricStore,
    Submission, SubmittedAnswer, ValidationResult, WeightConfig,
};
use futures::future::join_all;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::strategy::ScoringStrategy;

/// Why the scheduler stopped starting new answer tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Timeout,
    Cancelled,
}

impl StopReason {
    fn describe(self) -> &'static str {
        match self {
            Self::Timeout => "timeout: submission deadline elapsed before this answer started",
            Self::Cancelled => "cancelled before this answer started",
        }
    }
}

/// Drives scoring across submissions with bounded concurrency.
pub struct Scheduler {
    rubric: Arc<RubricStore>,
    strategy: Arc<ScoringStrategy>,
    config: Arc<EngineConfig>,
    /// Normalized once at construction.
    weights: WeightConfig,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("rubric", &self.rubric)
            .field("config", &self.config)
            .field("weights", &self.weights)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Validate the configuration, normalize weights and bind the strategy
    /// to this configuration. Fails fast.
    pub fn new(
        rubric: Arc<RubricStore>,
        strategy: ScoringStrategy,
        config: EngineConfig,
    ) -> ValidationResult<Self> {
        config.validate()?;
        let weights = config.weights.normalized()?;
        Ok(Self {
            rubric,
            strategy: Arc::new(strategy.with_config(&config)),
            config: Arc::new(config),
            weights,
        })
    }

    pub fn weights(&self) -> &WeightConfig {
        &self.weights
    }

    /// Score every answer of one submission.
    pub async fn run(&self, submission: &Submission) -> ValidationResult<ParticipantResult> {
        self.run_with_cancel(submission, &CancellationToken::new())
            .await
    }

    pub async fn run_with_cancel(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> ValidationResult<ParticipantResult> {
        submission.validate()?;
        Ok(self.run_validated(submission, cancel).await)
    }

    /// Score a batch. All submissions are validated before any scoring.
    pub async fn run_batch(&self, submissions: &[Submission]) -> ValidationResult<BatchReport> {
        self.run_batch_with_cancel(submissions, &CancellationToken::new())
            .await
    }

    pub async fn run_batch_with_cancel(
        &self,
        submissions: &[Submission],
        cancel: &CancellationToken,
    ) -> ValidationResult<BatchReport> {
        for submission in submissions {
            submission.validate()?;
        }

        info!(
            submissions = submissions.len(),
            strategy = %self.strategy.kind(),
            max_concurrency = self.config.max_concurrency,
            self_consistency_runs = self.config.self_consistency_runs,
            "batch started"
        );

        let results =
            join_all(submissions.iter().map(|s| self.run_validated(s, cancel))).await;

        Ok(BatchReport::new(results))
    }

    async fn run_validated(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> ParticipantResult {
        let participant = submission.participant_id.as_str();
        let total = submission.answers.len();
        let limit = self.config.max_concurrency;
        let deadline = self.config.submission_timeout().map(|t| Instant::now() + t);

        let timeout = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timeout);

        let mut slots: Vec<Option<AnswerResult>> = vec![None; total];
        let mut join_set: JoinSet<(usize, AnswerResult)> = JoinSet::new();
        let mut next = 0usize;
        let mut stopped: Option<StopReason> = None;

        loop {
            if stopped.is_none() {
                if cancel.is_cancelled() {
                    warn!(participant, started = next, total, "grading cancelled, no new answers will start");
                    stopped = Some(StopReason::Cancelled);
                } else if deadline.is_some_and(|d| Instant::now() >= d) {
                    warn!(participant, started = next, total, "submission timeout, no new answers will start");
                    stopped = Some(StopReason::Timeout);
                }
            }

            while stopped.is_none() && next < total && join_set.len() < limit {
                let index = next;
                let answer = submission.answers[index].clone();
                let rubric = Arc::clone(&self.rubric);
                let strategy = Arc::clone(&self.strategy);
                let config = Arc::clone(&self.config);
                let weights = self.weights;

                join_set.spawn(async move {
                    let result = grade_answer(&rubric, &strategy, &config, &weights, answer).await;
                    (index, result)
                });
                next += 1;
            }

            if join_set.is_empty() {
                break;
            }

            tokio::select! {
                joined = join_set.join_next() => match joined {
                    Some(Ok((index, result))) => {
                        debug!(participant, question_id = %result.question_id, status = %result.status, "answer graded");
                        slots[index] = Some(result);
                    }
                    Some(Err(e)) => {
                        warn!(participant, error = %e, "answer task panicked");
                    }
                    None => break,
                },
                _ = &mut timeout, if stopped.is_none() => {
                    warn!(participant, started = next, total, "submission timeout, no new answers will start");
                    stopped = Some(StopReason::Timeout);
                }
                _ = cancel.cancelled(), if stopped.is_none() => {
                    warn!(participant, started = next, total, "grading cancelled, no new answers will start");
                    stopped = Some(StopReason::Cancelled);
                }
            }
        }

        let answers: Vec<AnswerResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let question_id = submission.answers[index].question_id.clone();
                    if index < next {
                        AnswerResult::failed(question_id, "answer task aborted unexpectedly")
                    } else {
                        let reason = stopped.unwrap_or(StopReason::Cancelled);
                        AnswerResult::failed(question_id, reason.describe())
                    }
                })
            })
            .collect();

        let result = ParticipantResult::assemble(participant, answers);
        info!(
            participant,
            answers = total,
            graded = result.graded_answers,
            failed = result.failed_answers(),
            aggregate_score = result.aggregate_score,
            "submission graded"
        );
        result
    }
}

/// Strategy → aggregation → weighting for one answer. Never fails; every
/// problem becomes a tagged result.
async fn grade_answer(
    rubric: &RubricStore,
    strategy: &ScoringStrategy,
    config: &EngineConfig,
    weights: &WeightConfig,
    answer: SubmittedAnswer,
) -> AnswerResult {
    let Some(question) = rubric.lookup(&answer.question_id) else {
        info!(question_id = %answer.question_id, "question not in rubric, skipping");
        return AnswerResult::skipped_missing_question(answer.question_id);
    };

    let samples = match strategy.evaluate(question, &answer.answer).await {
        Ok(samples) => samples,
        Err(e) => {
            warn!(question_id = %answer.question_id, error = %e, "answer could not be scored");
            return AnswerResult::failed(answer.question_id, e.to_string());
        }
    };

    let consensus = match aggregate_samples(&samples) {
        Ok(c) => c,
        Err(e) => return AnswerResult::failed(answer.question_id, e.to_string()),
    };
    let scores = consensus.scores.clamped(config.criterion_max);

    match weighted_score(&scores, weights) {
        Ok(grade) => AnswerResult::ok(answer.question_id, scores, grade, consensus.samples_used)
            .with_comment(consensus.comment),
        Err(e) => AnswerResult::failed(answer.question_id, e.to_string()),
    }
}
