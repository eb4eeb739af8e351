//! Concurrent rubric grader.
//!
//! Scores participant answers against expected answers on three criteria
//! (completeness, conciseness, correctness), either with a deterministic
//! token-overlap heuristic or by sampling an LLM oracle K times and taking
//! the per-criterion median. Pure scoring math lives in the `evaluation`
//! crate; this crate owns the oracle, the strategies and the scheduler.

pub mod config;
pub mod errors;
pub mod oracle;
pub mod prompts;
pub mod scheduler;
pub mod strategy;

pub use config::{EngineConfig, OracleConfig, StrategyKind};
pub use errors::{OracleError, RetryCategory, StrategyError};
pub use oracle::{check_endpoint, OpenAiOracle, Oracle};
pub use scheduler::Scheduler;
pub use strategy::{HeuristicScorer, SamplingScorer, ScoringStrategy};
