use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use evaluation::{RubricStore, Submission};
use grader::{check_endpoint, EngineConfig, Scheduler, ScoringStrategy, StrategyKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Grade participant submissions against a rubric of expected answers.
#[derive(Debug, Parser)]
#[command(name = "grader", version, about)]
struct Cli {
    /// Rubric JSON: `{"questions": {"Q1": {...}}}` or `{"questions": [{"id": "Q1", ...}]}`.
    #[arg(long, required_unless_present = "check_oracle")]
    questions: Option<PathBuf>,

    /// Submission files or directories of `*.json` submissions.
    #[arg(long, num_args = 1.., required_unless_present = "check_oracle")]
    submissions: Vec<PathBuf>,

    /// TOML engine configuration.
    #[arg(long, env = "GRADER_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Self-consistency sample count.
    #[arg(long)]
    runs: Option<usize>,

    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Probe the oracle endpoint and exit.
    #[arg(long)]
    check_oracle: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(runs) = cli.runs {
        config.self_consistency_runs = runs;
    }
    if let Some(n) = cli.max_concurrency {
        config.max_concurrency = n;
    }

    if cli.check_oracle {
        let reachable =
            check_endpoint(&config.oracle.base_url, config.oracle.api_key.as_deref()).await;
        info!(url = %config.oracle.base_url, reachable, "oracle endpoint check");
        if !reachable {
            bail!("oracle endpoint {} is not reachable", config.oracle.base_url);
        }
        return Ok(());
    }

    let Some(questions) = cli.questions.as_deref() else {
        bail!("--questions is required");
    };
    let rubric = RubricStore::from_path(questions)?;
    let submissions = load_submissions(&cli.submissions)?;
    if submissions.is_empty() {
        warn!("no submissions found");
    }

    let strategy = ScoringStrategy::from_config(&config).context("Failed to build oracle")?;
    info!(
        questions = rubric.len(),
        submissions = submissions.len(),
        strategy = %strategy.kind(),
        "grader starting"
    );

    let scheduler = Scheduler::new(Arc::new(rubric), strategy, config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight answers");
            on_signal.cancel();
        }
    });

    let report = scheduler
        .run_batch_with_cancel(&submissions, &cancel)
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Collect submissions from files and directories, in sorted path order.
/// Unreadable or malformed files are skipped with a warning.
fn load_submissions(paths: &[PathBuf]) -> Result<Vec<Submission>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path)
                .with_context(|| format!("Failed to list {}", path.display()))?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                })
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    let mut submissions = Vec::with_capacity(files.len());
    for file in &files {
        match read_submission(file) {
            Ok(s) => submissions.push(s),
            Err(e) => warn!(path = %file.display(), error = %e, "skipping submission"),
        }
    }
    Ok(submissions)
}

fn read_submission(path: &Path) -> Result<Submission> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, participant: &str) {
        let body = format!(
            r#"{{"participant_id": "{participant}", "answers": [{{"question_id": "Q1", "answer": "Paris"}}]}}"#
        );
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_directory_scan_matches_extension_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b_team.JSON", "B");
        write(dir.path(), "a_team.json", "A");
        write(dir.path(), "c_team.Json", "C");
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let subs = load_submissions(&[dir.path().to_path_buf()]).unwrap();
        let ids: Vec<&str> = subs.iter().map(|s| s.participant_id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "C"]);
    }

    #[test]
    fn test_malformed_submission_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.json", "Good");
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let subs = load_submissions(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].participant_id, "Good");
    }
}
