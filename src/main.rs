mod auth;
mod cli;
mod config;
mod environment;
mod error;
mod fixtures;
mod history;
mod http;
mod report;
mod runner;
mod storage;
mod testing;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use cli::CliArgs;
use config::{ConfigError, HarnessConfig, history_path, load_properties};
use error::HarnessError;
use history::RunHistory;
use report::{ConsoleReport, HtmlReport, write_recent_runs};
use runner::{RunContext, Runner};

const EXIT_FAILURES: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(&args);

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURES),
        Err(err) => {
            error!(error = %err, "run aborted");
            eprintln!("error: {err}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Returns whether every case passed or was skipped. Listing stored runs
/// always counts as success.
async fn run(args: &CliArgs) -> Result<bool, HarnessError> {
    let base_dir = std::env::current_dir().map_err(|source| HarnessError::WorkingDir { source })?;

    let properties = load_properties(args.config.as_deref(), &base_dir, std::env::vars())?;

    if let Some(limit) = args.recent_runs {
        let path =
            history_path(&properties, &args.overrides(), &base_dir).ok_or(ConfigError::Missing("HISTORY_DB"))?;
        let runs = RunHistory::open(&path)?.recent_runs_with_cases(usize::from(limit))?;
        write_recent_runs(io::stdout().lock(), &runs, args.format)?;
        return Ok(true);
    }

    let config = HarnessConfig::from_properties(&properties, &args.overrides(), &base_dir)?;
    info!(
        fixtures = %config.fixture_dir.display(),
        report = %config.report.path.display(),
        "configuration loaded"
    );

    let mut runner = Runner::new(RunContext::from_config(&config)?)
        .with_sink(ConsoleReport::new(io::stdout(), args.format))
        .with_sink(HtmlReport::new(config.report.clone()));
    if let Some(path) = &config.history_db {
        runner = runner.with_sink(RunHistory::open(path)?);
    }

    let summary = runner.run().await?;
    Ok(!summary.has_failures())
}

fn init_logging(args: &CliArgs) {
    let builder = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(io::stderr);

    let result = if args.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = result {
        eprintln!("failed to initialize logging: {err}");
    }
}
