use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::history::HistoryError;
use crate::http::CallError;
use crate::report::ReportError;

/// Failure to turn a fixture file into a JSON document or a case id.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture not found: {}: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in fixture {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed fixture name `{file_name}`: {reason}")]
    MalformedName {
        file_name: String,
        reason: &'static str,
    },
}

/// Errors that abort a whole run. Anything scoped to one test case is
/// recorded as that case's outcome instead.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to resolve working directory: {source}")]
    WorkingDir {
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("fixture directory `{}` does not exist or is not a directory", .0.display())]
    FixtureRoot(PathBuf),
    #[error("failed to set up HTTP client: {0}")]
    Client(#[from] CallError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    History(#[from] HistoryError),
}
