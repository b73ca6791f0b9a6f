//! # Reporting
//!
//! Sinks that receive each case outcome as it is recorded and a final
//! completion signal with the run summary.

mod console;
mod html;
mod style;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::history::HistoryError;
use crate::testing::{CaseOutcome, RunSummary};

pub use console::{ConsoleReport, write_recent_runs};
pub use html::HtmlReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write run output: {0}")]
    Output(#[source] io::Error),
    #[error("failed to serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to record run history: {0}")]
    History(#[from] HistoryError),
}

/// Receiver of per-case outcomes.
///
/// `record` is called once per case, from a single writer, in completion
/// order. `finish` is called exactly once after the last case.
pub trait ReportSink {
    fn record(&mut self, outcome: &CaseOutcome);

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError>;
}
