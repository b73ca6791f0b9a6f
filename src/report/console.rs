use std::io::Write;

use tracing::warn;

use super::{ReportError, ReportSink};
use crate::cli::OutputFormat;
use crate::history::StoredRun;
use crate::testing::{CaseOutcome, RunSummary};

/// Progress and summary on stdout, as plain text or one JSON document.
pub struct ConsoleReport<W: Write> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> ConsoleReport<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ConsoleReport<W> {
    fn record(&mut self, outcome: &CaseOutcome) {
        if self.format != OutputFormat::Text {
            return;
        }

        let line = match (outcome.outcome.reason(), outcome.outcome.detail()) {
            (Some(reason), Some(detail)) => format!(
                "{:<4}  {} ({} ms) {reason}: {detail}",
                outcome.outcome.label(),
                outcome.case_id,
                outcome.duration_ms
            ),
            _ => format!("{:<4}  {} ({} ms)", outcome.outcome.label(), outcome.case_id, outcome.duration_ms),
        };
        if let Err(err) = writeln!(self.out, "{line}") {
            warn!(error = %err, "failed to write progress line");
        }
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        match self.format {
            OutputFormat::Text => writeln!(
                self.out,
                "\n{} cases: {} passed, {} failed, {} skipped ({} ms)",
                summary.total, summary.passed, summary.failed, summary.skipped, summary.duration_ms
            )
            .map_err(ReportError::Output)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut self.out, summary)?;
                writeln!(self.out).map_err(ReportError::Output)?;
            }
        }
        self.out.flush().map_err(ReportError::Output)
    }
}

/// List stored runs, newest first.
pub fn write_recent_runs<W: Write>(
    mut out: W,
    runs: &[StoredRun],
    format: OutputFormat,
) -> Result<(), ReportError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, runs)?;
            writeln!(out).map_err(ReportError::Output)?;
        }
        OutputFormat::Text => {
            if runs.is_empty() {
                writeln!(out, "no runs recorded").map_err(ReportError::Output)?;
            }
            for stored in runs {
                let run = &stored.run;
                writeln!(
                    out,
                    "Run {}  {}  {} cases: {} passed, {} failed, {} skipped ({} ms)",
                    run.id,
                    run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    run.total,
                    run.passed,
                    run.failed,
                    run.skipped,
                    run.duration_ms
                )
                .map_err(ReportError::Output)?;
                for case in &stored.cases {
                    let line = match (&case.reason, &case.detail) {
                        (Some(reason), Some(detail)) => format!(
                            "  {:<4}  {} ({} ms) {reason}: {detail}",
                            case.status, case.case_id, case.duration_ms
                        ),
                        _ => format!("  {:<4}  {} ({} ms)", case.status, case.case_id, case.duration_ms),
                    };
                    writeln!(out, "{line}").map_err(ReportError::Output)?;
                }
            }
        }
    }
    out.flush().map_err(ReportError::Output)
}
