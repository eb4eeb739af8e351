//! Engine configuration.
//!
//! One immutable [`EngineConfig`] is built at startup and threaded through
//! the scheduler behind an `Arc`; no task reads ambient configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (applied by `main`)
//! 2. Environment variables (`GRADER_*`, `OPENAI_*`)
//! 3. TOML config file
//! 4. Built-in defaults

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use evaluation::{RetryPolicy, ValidationError, ValidationResult, WeightConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default OpenAI-compatible endpoint.
const DEFAULT_ORACLE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_ORACLE_MODEL: &str = "gpt-4o-mini";
/// Matches the fixed worker count the grader has always run with.
const DEFAULT_MAX_CONCURRENCY: usize = 6;
const DEFAULT_SUBMISSION_TIMEOUT_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

const ENV_ORACLE_URL: &str = "GRADER_ORACLE_URL";
const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_MODEL: &str = "OPENAI_MODEL";
const ENV_MAX_CONCURRENCY: &str = "GRADER_MAX_CONCURRENCY";
const ENV_RUNS: &str = "GRADER_SELF_CONSISTENCY_RUNS";
const ENV_SUBMISSION_TIMEOUT: &str = "GRADER_SUBMISSION_TIMEOUT_SECS";
const ENV_STRATEGY: &str = "GRADER_STRATEGY";

/// Which scoring strategy the engine is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Token-overlap heuristic; no oracle calls.
    #[default]
    Heuristic,
    /// Oracle sampling with self-consistency.
    Sampling,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heuristic => write!(f, "heuristic"),
            Self::Sampling => write!(f, "sampling"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "sampling" | "llm" => Ok(Self::Sampling),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token. `None` means no oracle is configured.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    /// Kept at the minimum to reduce (not remove) sample variance.
    pub temperature: f64,
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORACLE_URL.to_string(),
            api_key: None,
            model: DEFAULT_ORACLE_MODEL.to_string(),
            temperature: 0.0,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl OracleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: WeightConfig,
    /// Oracle samples per answer; 1 disables self-consistency.
    pub self_consistency_runs: usize,
    /// Ceiling on in-flight oracle calls across the whole batch.
    pub max_concurrency: usize,
    /// Upper bound of every criterion score.
    pub criterion_max: f64,
    /// Fewer surviving samples than this marks the answer `failed`.
    pub min_usable_samples: usize,
    /// Per-submission wall clock budget; 0 disables the timeout.
    pub submission_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub strategy: StrategyKind,
    pub oracle: OracleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: WeightConfig::default(),
            self_consistency_runs: 1,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            criterion_max: evaluation::DEFAULT_CRITERION_MAX,
            min_usable_samples: 1,
            submission_timeout_secs: DEFAULT_SUBMISSION_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
            strategy: StrategyKind::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse grader config TOML")
    }

    /// Load the TOML file (if any), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Overlay `GRADER_*` / `OPENAI_*` environment variables.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(ENV_ORACLE_URL) {
            self.oracle.base_url = url;
        }
        if let Ok(key) = env::var(ENV_API_KEY) {
            if !key.trim().is_empty() {
                self.oracle.api_key = Some(key);
            }
        }
        if let Ok(model) = env::var(ENV_MODEL) {
            self.oracle.model = model;
        }
        if let Some(v) = parse_env::<usize>(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = v;
        }
        if let Some(v) = parse_env::<usize>(ENV_RUNS) {
            self.self_consistency_runs = v;
        }
        if let Some(v) = parse_env::<u64>(ENV_SUBMISSION_TIMEOUT) {
            self.submission_timeout_secs = v;
        }
        if let Some(v) = parse_env::<StrategyKind>(ENV_STRATEGY) {
            self.strategy = v;
        }
    }

    /// Check every invariant the engine relies on. Runs before any scoring.
    pub fn validate(&self) -> ValidationResult<()> {
        self.weights.validate()?;
        if self.self_consistency_runs < 1 {
            return Err(ValidationError::InvalidSelfConsistencyRuns(
                self.self_consistency_runs,
            ));
        }
        if self.max_concurrency < 1 {
            return Err(ValidationError::InvalidConcurrency(self.max_concurrency));
        }
        if !self.criterion_max.is_finite() || self.criterion_max <= 0.0 {
            return Err(ValidationError::InvalidCriterionMax(self.criterion_max));
        }
        if self.min_usable_samples < 1 || self.min_usable_samples > self.self_consistency_runs {
            return Err(ValidationError::InvalidMinSamples {
                got: self.min_usable_samples,
                runs: self.self_consistency_runs,
            });
        }
        Ok(())
    }

    pub fn submission_timeout(&self) -> Option<Duration> {
        (self.submission_timeout_secs > 0).then(|| Duration::from_secs(self.submission_timeout_secs))
    }

    /// Whether an oracle can actually be called.
    pub fn oracle_configured(&self) -> bool {
        self.oracle.api_key.is_some() && !self.oracle.base_url.trim().is_empty()
    }

    /// Strategy that will actually run: sampling without an oracle falls
    /// back to the heuristic.
    pub fn effective_strategy(&self) -> StrategyKind {
        match self.strategy {
            StrategyKind::Sampling if !self.oracle_configured() => {
                warn!("sampling strategy requested but no oracle API key is set; using heuristic");
                StrategyKind::Heuristic
            }
            other => other,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = env::var(var).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrency, 6);
        assert_eq!(config.criterion_max, 5.0);
        assert_eq!(config.submission_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            self_consistency_runs = 3
            strategy = "sampling"

            [weights]
            completeness = 1.0
            conciseness = 1.0
            correctness = 2.0

            [oracle]
            model = "local-judge"
            "#,
        )
        .unwrap();
        assert_eq!(config.self_consistency_runs, 3);
        assert_eq!(config.strategy, StrategyKind::Sampling);
        assert_eq!(config.weights.correctness, 2.0);
        assert_eq!(config.oracle.model, "local-judge");
        assert_eq!(config.oracle.base_url, DEFAULT_ORACLE_URL);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grader.toml");
        std::fs::write(&path, "max_concurrency = 2\n[retry]\nmax_retries = 0\n").unwrap();
        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.initial_backoff_ms, 500);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = EngineConfig::load(Some(Path::new("/nonexistent/grader.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig {
            self_consistency_runs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidSelfConsistencyRuns(0))
        );

        config.self_consistency_runs = 2;
        config.max_concurrency = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidConcurrency(0)));

        config.max_concurrency = 1;
        config.weights = WeightConfig::new(0.0, 0.0, 0.0);
        assert_eq!(config.validate(), Err(ValidationError::ZeroWeightSum));

        config.weights = WeightConfig::default();
        config.min_usable_samples = 3;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidMinSamples { got: 3, runs: 2 })
        ));

        config.min_usable_samples = 1;
        config.criterion_max = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidCriterionMax(_))
        ));
    }

    #[test]
    fn test_sampling_without_key_falls_back() {
        let config = EngineConfig {
            strategy: StrategyKind::Sampling,
            ..Default::default()
        };
        assert!(!config.oracle_configured());
        assert_eq!(config.effective_strategy(), StrategyKind::Heuristic);
    }

    #[test]
    fn test_sampling_with_key_kept() {
        let mut config = EngineConfig {
            strategy: StrategyKind::Sampling,
            ..Default::default()
        };
        config.oracle.api_key = Some("sk-test".into());
        assert_eq!(config.effective_strategy(), StrategyKind::Sampling);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("Sampling".parse::<StrategyKind>(), Ok(StrategyKind::Sampling));
        assert_eq!("llm".parse::<StrategyKind>(), Ok(StrategyKind::Sampling));
        assert!("magic".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = EngineConfig {
            submission_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.submission_timeout().is_none());
    }
}
