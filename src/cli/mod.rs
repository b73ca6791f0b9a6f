//! # CLI
//!
//! Command-line surface for CI pipelines. Every flag overrides the matching
//! properties key; output goes to stdout, logs to stderr.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::Level;

use crate::config::Overrides;

/// Replays JSON request fixtures against an HTTP endpoint and checks the
/// responses against expected fixtures.
#[derive(Parser, Debug)]
#[command(name = "fixture-runner", version, about, long_about = None)]
pub struct CliArgs {
    /// Properties file (default: application.properties in the working directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Fixture root directory, relative to the working directory
    #[arg(long, value_name = "DIR")]
    pub fixtures: Option<PathBuf>,

    /// Base URI, e.g. http://localhost:8080
    #[arg(long, value_name = "URL")]
    pub base_uri: Option<String>,

    /// Endpoint path appended to the base URI and base path
    #[arg(long)]
    pub endpoint: Option<String>,

    /// HTML report destination
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Console output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Number of cases run at the same time
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// SQLite database that keeps the history of runs
    #[arg(long, value_name = "PATH")]
    pub history_db: Option<PathBuf>,

    /// List the N most recent stored runs instead of running fixtures
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub recent_runs: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", value_parser = clap::value_parser!(Level))]
    pub log_level: Level,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// Output format for console reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl CliArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            fixture_dir: self.fixtures.clone(),
            base_uri: self.base_uri.clone(),
            endpoint: self.endpoint.clone(),
            report_path: self.report.clone(),
            concurrency: self.jobs.map(usize::from),
            history_db: self.history_db.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_flags() {
        let args = CliArgs::try_parse_from(["fixture-runner"]).unwrap();
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.log_level, Level::INFO);
        assert!(args.recent_runs.is_none());
        assert!(!args.log_json);

        let overrides = args.overrides();
        assert!(overrides.base_uri.is_none());
        assert!(overrides.concurrency.is_none());
    }

    #[test]
    fn flags_become_overrides() {
        let args = CliArgs::try_parse_from([
            "fixture-runner",
            "--fixtures",
            "cases",
            "--base-uri",
            "http://127.0.0.1:9000",
            "--endpoint",
            "/login",
            "--report",
            "out/report.html",
            "--format",
            "json",
            "--jobs",
            "4",
            "--history-db",
            "runs.db",
        ])
        .unwrap();

        assert_eq!(args.format, OutputFormat::Json);
        let overrides = args.overrides();
        assert_eq!(overrides.fixture_dir, Some(PathBuf::from("cases")));
        assert_eq!(overrides.base_uri.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(overrides.endpoint.as_deref(), Some("/login"));
        assert_eq!(overrides.report_path, Some(PathBuf::from("out/report.html")));
        assert_eq!(overrides.concurrency, Some(4));
        assert_eq!(overrides.history_db, Some(PathBuf::from("runs.db")));
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(CliArgs::try_parse_from(["fixture-runner", "--jobs", "0"]).is_err());
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(CliArgs::try_parse_from(["fixture-runner", "--format", "xml"]).is_err());
    }

    #[test]
    fn log_levels_are_parsed() {
        let args = CliArgs::try_parse_from(["fixture-runner", "--log-level", "debug"]).unwrap();
        assert_eq!(args.log_level, Level::DEBUG);
        let args = CliArgs::try_parse_from(["fixture-runner", "--log-level", "WARN"]).unwrap();
        assert_eq!(args.log_level, Level::WARN);
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(CliArgs::try_parse_from(["fixture-runner", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn recent_runs_takes_a_positive_count() {
        let args = CliArgs::try_parse_from(["fixture-runner", "--recent-runs", "5"]).unwrap();
        assert_eq!(args.recent_runs, Some(5));
        assert!(CliArgs::try_parse_from(["fixture-runner", "--recent-runs", "0"]).is_err());
    }
}
