//! Grading error taxonomy with retry classification.
//!
//! Oracle errors are classified into a [`RetryCategory`] so the sampling
//! loop can decide whether to retry without string matching.
//!
//! | Category      | Retriable | Source                               |
//! |---------------|-----------|--------------------------------------|
//! | Transient     | yes       | network failure, request timeout     |
//! | RateLimit     | yes       | HTTP 429 from the provider           |
//! | ParseFailure  | yes       | malformed or out-of-range response   |
//! | Configuration | no        | missing key, bad URL                 |
//!
//! Answer-level failures ([`StrategyError`]) are never propagated past the
//! scheduler; they become `failed` answer results.

use std::fmt;

use thiserror::Error;

/// Classification used by the sampling loop to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Network or backend hiccup; retry after back-off.
    Transient,
    /// Provider rate limit; retry after back-off.
    RateLimit,
    /// Oracle answered but the scores could not be used.
    ParseFailure,
    /// Misconfiguration. Not retried.
    Configuration,
}

impl RetryCategory {
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::Transient | Self::RateLimit | Self::ParseFailure
        )
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::ParseFailure => write!(f, "parse_failure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Failure of a single oracle call.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Oracle timeout: {0}")]
    Timeout(String),

    #[error("Oracle rate limit: {0}")]
    RateLimit(String),

    #[error("Oracle transport failure: {0}")]
    Transport(String),

    /// The oracle replied but its output is unusable (bad JSON, missing or
    /// out-of-range scores).
    #[error("Malformed oracle response: {0}")]
    Malformed(String),

    #[error("Oracle configuration error: {0}")]
    Configuration(String),
}

impl OracleError {
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::Timeout(_) | Self::Transport(_) => RetryCategory::Transient,
            Self::RateLimit(_) => RetryCategory::RateLimit,
            Self::Malformed(_) => RetryCategory::ParseFailure,
            Self::Configuration(_) => RetryCategory::Configuration,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.retry_category().is_retriable()
    }
}

/// Failure to produce scores for one answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    /// Every sample exhausted its retry budget.
    #[error("No usable sample out of {attempted}: {reason}")]
    NoUsableSample { attempted: usize, reason: String },

    /// Some samples survived, but fewer than the configured minimum.
    #[error("Only {usable} usable sample(s), {required} required")]
    InsufficientSamples { usable: usize, required: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_categories() {
        assert!(OracleError::Timeout("t".into()).is_retriable());
        assert!(OracleError::RateLimit("429".into()).is_retriable());
        assert!(OracleError::Transport("reset".into()).is_retriable());
        assert!(OracleError::Malformed("no json".into()).is_retriable());
        assert!(!OracleError::Configuration("no key".into()).is_retriable());
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            OracleError::Timeout("t".into()).retry_category(),
            RetryCategory::Transient
        );
        assert_eq!(
            OracleError::Malformed("x".into()).retry_category(),
            RetryCategory::ParseFailure
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(RetryCategory::RateLimit.to_string(), "rate_limit");
        assert_eq!(RetryCategory::ParseFailure.to_string(), "parse_failure");
    }

    #[test]
    fn test_strategy_error_display() {
        let err = StrategyError::NoUsableSample {
            attempted: 2,
            reason: "Malformed oracle response: no JSON".into(),
        };
        assert!(err.to_string().starts_with("No usable sample out of 2"));
    }
}
