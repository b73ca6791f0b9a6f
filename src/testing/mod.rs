//! # Testing & Verdicts
//!
//! Turns an actual response and an expected fixture into a per-case outcome,
//! and aggregates outcomes into the summary of a batch run.

mod compare;

use std::fmt::{self, Display};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub use compare::{Difference, compare};

/// Why a case failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    FixtureParseError,
    CallFailure,
    ComparisonMismatch,
    /// The task running the case did not complete.
    Aborted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::FixtureParseError => "fixture-parse-error",
            FailureKind::CallFailure => "call-failure",
            FailureKind::ComparisonMismatch => "comparison-mismatch",
            FailureKind::Aborted => "aborted",
        }
    }
}

/// Why a case was neither passed nor failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    NoRequestFixture,
    NoExpectedFixture,
    MalformedIdentifier,
    DeadlineExceeded,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoRequestFixture => "no-request-fixture",
            SkipReason::NoExpectedFixture => "no-expected-fixture",
            SkipReason::MalformedIdentifier => "malformed-identifier",
            SkipReason::DeadlineExceeded => "deadline-exceeded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub differences: Vec<Difference>,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            differences: Vec::new(),
        }
    }
}

/// Verdict for one test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail(Failure),
    Skip { reason: SkipReason, detail: String },
}

impl Outcome {
    pub fn skip(reason: SkipReason, detail: impl Into<String>) -> Self {
        Outcome::Skip {
            reason,
            detail: detail.into(),
        }
    }

    pub fn fail(kind: FailureKind, detail: impl Into<String>) -> Self {
        Outcome::Fail(Failure::new(kind, detail))
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail(_))
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Outcome::Skip { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Fail(_) => "FAIL",
            Outcome::Skip { .. } => "SKIP",
        }
    }

    /// Machine-readable reason, e.g. `call-failure` or `no-expected-fixture`.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Outcome::Pass => None,
            Outcome::Fail(failure) => Some(failure.kind.as_str()),
            Outcome::Skip { reason, .. } => Some(reason.as_str()),
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Outcome::Pass => None,
            Outcome::Fail(failure) => Some(&failure.detail),
            Outcome::Skip { detail, .. } => Some(detail),
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.reason(), self.detail()) {
            (Some(reason), Some(detail)) => write!(f, "{}({reason}): {detail}", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}

/// Verdict for an actual response against an expected document.
///
/// A missing side is indeterminate and yields a skip, never a pass or a fail.
pub fn verdict(actual: Option<&Value>, expected: Option<&Value>) -> Outcome {
    let (actual, expected) = match (actual, expected) {
        (None, _) => return Outcome::skip(SkipReason::NoRequestFixture, "no actual response to compare"),
        (_, None) => return Outcome::skip(SkipReason::NoExpectedFixture, "no expected response fixture"),
        (Some(actual), Some(expected)) => (actual, expected),
    };

    let comparison = compare(actual, expected);
    if comparison.is_match() {
        return Outcome::Pass;
    }

    let mut detail = comparison.first().map(ToString::to_string).unwrap_or_default();
    let remaining = comparison.differences().len() - 1;
    if remaining > 0 {
        let qualifier = if comparison.is_truncated() { " or more" } else { "" };
        detail.push_str(&format!(" (+{remaining}{qualifier} other differences)"));
    }

    Outcome::Fail(Failure {
        kind: FailureKind::ComparisonMismatch,
        detail,
        differences: comparison.into_differences(),
    })
}

/// Outcome of one case as forwarded to report sinks.
#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    /// Case id, or the raw file name when no id could be derived.
    pub case_id: String,
    pub fixture: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub duration_ms: u64,
    /// Progress notes collected while the case ran.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
}

/// Summary report for a batch run, in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseOutcome>,
}

impl RunSummary {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration_ms: u64,
        results: Vec<CaseOutcome>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.outcome.is_pass()).count();
        let failed = results.iter().filter(|r| r.outcome.is_fail()).count();
        let skipped = results.iter().filter(|r| r.outcome.is_skip()).count();

        Self {
            started_at,
            finished_at,
            total: results.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
