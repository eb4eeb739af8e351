//! Scoring strategies.
//!
//! ```text
//! ScoringStrategy::evaluate(question, answer)
//!   ├─ Heuristic → [1 sample]              never suspends, never fails
//!   └─ Sampling  → [0..K samples]          K concurrent oracle calls
//!         each sample: permit → oracle → parse ─┬─ ok → keep
//!                                              └─ retriable → back-off, retry
//!                                                 budget spent → drop sample
//! ```
//!
//! The variant is chosen once, from configuration, when the engine is built.
//!
//! Every oracle call holds a permit from one shared [`Semaphore`] sized to
//! `max_concurrency`. The permit covers the call only, not the back-off
//! sleep, so waiting retries never starve other samples. Callers beyond the
//! ceiling queue on the semaphore; nothing is rejected.

use std::sync::Arc;

use evaluation::{heuristic, Question, RetryPolicy, ScoredSample};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::{EngineConfig, StrategyKind};
use crate::errors::{OracleError, StrategyError};
use crate::oracle::{OpenAiOracle, Oracle};
use crate::prompts::{build_prompt, parse_verdict};

// ── Heuristic ────────────────────────────────────────────────────────────────

/// Deterministic token-overlap scorer.
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    criterion_max: f64,
}

impl HeuristicScorer {
    pub fn new(criterion_max: f64) -> Self {
        Self { criterion_max }
    }

    pub fn score(&self, question: &Question, answer: &str) -> ScoredSample {
        heuristic::score(&question.expected_answer, answer, self.criterion_max)
    }
}

// ── Sampling ─────────────────────────────────────────────────────────────────

/// Oracle-backed scorer drawing `runs` independent samples per answer.
pub struct SamplingScorer {
    oracle: Arc<dyn Oracle>,
    permits: Arc<Semaphore>,
    runs: usize,
    min_usable: usize,
    retry: RetryPolicy,
    criterion_max: f64,
}

impl SamplingScorer {
    /// Build from the engine configuration; the call ceiling is
    /// `config.max_concurrency`.
    pub fn new(oracle: Arc<dyn Oracle>, config: &EngineConfig) -> Self {
        Self {
            oracle,
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            runs: config.self_consistency_runs.max(1),
            min_usable: config.min_usable_samples.max(1),
            retry: config.retry.clone(),
            criterion_max: config.criterion_max,
        }
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Draw all samples concurrently and keep the ones that parsed.
    pub async fn sample(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<Vec<ScoredSample>, StrategyError> {
        let attempts = (0..self.runs).map(|index| self.sample_once(index, question, answer));
        let outcomes = join_all(attempts).await;

        let mut samples = Vec::with_capacity(self.runs);
        let mut last_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(sample) => samples.push(sample),
                Err(e) => last_error = Some(e),
            }
        }

        if samples.is_empty() {
            return Err(StrategyError::NoUsableSample {
                attempted: self.runs,
                reason: last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no samples requested".to_string()),
            });
        }
        if samples.len() < self.min_usable {
            return Err(StrategyError::InsufficientSamples {
                usable: samples.len(),
                required: self.min_usable,
            });
        }

        debug!(
            question_id = %question.id,
            usable = samples.len(),
            requested = self.runs,
            "samples collected"
        );
        Ok(samples)
    }

    /// One sample with its own retry budget.
    async fn sample_once(
        &self,
        index: usize,
        question: &Question,
        answer: &str,
    ) -> Result<ScoredSample, OracleError> {
        let prompt = build_prompt(index, question, answer, self.criterion_max);
        let mut attempt = 0u32;

        loop {
            if attempt > 0 {
                let backoff = self.retry.backoff_duration(attempt);
                tokio::time::sleep(backoff).await;
            }

            let result = match self.call(&prompt).await {
                Ok(raw) => parse_verdict(&raw, self.criterion_max),
                Err(e) => Err(e),
            };

            match result {
                Ok(sample) => return Ok(sample),
                Err(e) if e.is_retriable() && self.retry.should_retry(attempt) => {
                    warn!(
                        question_id = %question.id,
                        sample = index,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        backoff_ms = self.retry.backoff_ms(attempt + 1),
                        category = %e.retry_category(),
                        error = %e,
                        "oracle sample failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        question_id = %question.id,
                        sample = index,
                        attempts = attempt + 1,
                        error = %e,
                        "oracle sample dropped"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn call(&self, prompt: &str) -> Result<String, OracleError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| OracleError::Configuration("oracle call limiter closed".into()))?;
        self.oracle.complete(prompt).await
    }
}

// ── Strategy ─────────────────────────────────────────────────────────────────

/// The scoring capability handed to the scheduler.
pub enum ScoringStrategy {
    Heuristic(HeuristicScorer),
    Sampling(SamplingScorer),
}

impl ScoringStrategy {
    pub fn heuristic(criterion_max: f64) -> Self {
        Self::Heuristic(HeuristicScorer::new(criterion_max))
    }

    pub fn sampling(oracle: Arc<dyn Oracle>, config: &EngineConfig) -> Self {
        Self::Sampling(SamplingScorer::new(oracle, config))
    }

    /// Build the configured strategy, falling back to the heuristic when
    /// no oracle is configured.
    pub fn from_config(config: &EngineConfig) -> Result<Self, OracleError> {
        match config.effective_strategy() {
            StrategyKind::Heuristic => Ok(Self::heuristic(config.criterion_max)),
            StrategyKind::Sampling => {
                let oracle = OpenAiOracle::from_config(&config.oracle)?;
                Ok(Self::sampling(Arc::new(oracle), config))
            }
        }
    }

    /// Rebind every scoring parameter to `config`, keeping only the oracle.
    ///
    /// Sample count, retry budget, usable-sample floor, score scale and the
    /// oracle call ceiling all come from `config` afterwards.
    pub fn with_config(self, config: &EngineConfig) -> Self {
        match self {
            Self::Heuristic(_) => Self::heuristic(config.criterion_max),
            Self::Sampling(s) => Self::sampling(s.oracle, config),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Heuristic(_) => StrategyKind::Heuristic,
            Self::Sampling(_) => StrategyKind::Sampling,
        }
    }

    /// Produce one or more raw samples for `answer`.
    pub async fn evaluate(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<Vec<ScoredSample>, StrategyError> {
        match self {
            Self::Heuristic(h) => Ok(vec![h.score(question, answer)]),
            Self::Sampling(s) => s.sample(question, answer).await,
        }
    }
}

impl std::fmt::Debug for ScoringStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heuristic(h) => f.debug_tuple("Heuristic").field(h).finish(),
            Self::Sampling(s) => f
                .debug_struct("Sampling")
                .field("oracle", &s.oracle.name())
                .field("runs", &s.runs)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use evaluation::CriterionScores;

    use super::*;

    /// Replays scripted replies in order, then repeats the last one.
    struct ScriptedOracle {
        replies: Vec<Result<String, OracleError>>,
        calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(replies: Vec<Result<String, OracleError>>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies[n.min(self.replies.len() - 1)].clone()
        }
    }

    fn config(runs: usize) -> EngineConfig {
        EngineConfig {
            self_consistency_runs: runs,
            retry: RetryPolicy {
                max_retries: 2,
                initial_backoff_ms: 10,
                backoff_multiplier: 2.0,
                max_backoff_ms: 100,
            },
            ..Default::default()
        }
    }

    fn question() -> Question {
        Question::new("Q1", "Paris is the capital of France.")
    }

    const GOOD: &str = r#"{"completeness": 4, "conciseness": 5, "correctness": 3, "comment": "ok"}"#;

    #[tokio::test]
    async fn test_heuristic_single_sample() {
        let strategy = ScoringStrategy::heuristic(5.0);
        let samples = strategy
            .evaluate(&question(), "The capital of France is Paris.")
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].scores, CriterionScores::new(5.0, 5.0, 5.0, 5.0));
        assert_eq!(strategy.kind(), StrategyKind::Heuristic);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_then_valid_is_retried() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok("not json".into()),
            Ok(GOOD.into()),
        ]));
        let strategy = ScoringStrategy::sampling(oracle.clone(), &config(1));
        let samples = strategy.evaluate(&question(), "Paris").await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].scores.correctness, 3.0);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_yield_no_usable_sample() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok("garbage".into())]));
        let strategy = ScoringStrategy::sampling(oracle.clone(), &config(2));
        let err = strategy.evaluate(&question(), "Paris").await.unwrap_err();
        assert!(matches!(err, StrategyError::NoUsableSample { attempted: 2, .. }));
        // 2 samples × (1 attempt + 2 retries)
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_error_not_retried() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Err(OracleError::Configuration(
            "HTTP 401".into(),
        ))]));
        let strategy = ScoringStrategy::sampling(oracle.clone(), &config(1));
        assert!(strategy.evaluate(&question(), "Paris").await.is_err());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retried() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Err(OracleError::RateLimit("HTTP 429".into())),
            Ok(GOOD.into()),
        ]));
        let strategy = ScoringStrategy::sampling(oracle, &config(1));
        let samples = strategy.evaluate(&question(), "Paris").await.unwrap();
        assert_eq!(samples[0].comment.as_deref(), Some("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_usable_samples_enforced() {
        // First sample succeeds; the other two never do.
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(GOOD.into()),
            Ok("bad".into()),
        ]));
        let mut cfg = config(3);
        cfg.min_usable_samples = 2;
        cfg.retry = RetryPolicy::none();
        let strategy = ScoringStrategy::sampling(oracle, &cfg);
        let err = strategy.evaluate(&question(), "Paris").await.unwrap_err();
        assert_eq!(
            err,
            StrategyError::InsufficientSamples {
                usable: 1,
                required: 2
            }
        );
    }

    #[test]
    fn test_from_config_without_key_is_heuristic() {
        let cfg = EngineConfig {
            strategy: StrategyKind::Sampling,
            ..Default::default()
        };
        let strategy = ScoringStrategy::from_config(&cfg).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::Heuristic);
    }
}
