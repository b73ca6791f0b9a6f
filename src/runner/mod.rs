//! # Runner
//!
//! Drives a batch run: discovers request fixtures, runs every case against
//! the configured endpoint, forwards each outcome to the report sinks and
//! returns the run summary.
//!
//! A case never aborts the run. Only setup problems (configuration, a
//! missing fixture root) and sinks that fail at `finish` are fatal.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::config::HarnessConfig;
use crate::error::{FixtureError, HarnessError};
use crate::fixtures::{CaseId, RequestFixture, extract_case_id, load_document, locate};
use crate::http::{CallExecutor, error_chain};
use crate::report::ReportSink;
use crate::testing::{CaseOutcome, FailureKind, Outcome, RunSummary, SkipReason, verdict};

/// Everything a case needs, built once per run and shared by reference.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub fixture_root: PathBuf,
    pub endpoint: String,
    pub executor: CallExecutor,
    pub max_scan_depth: usize,
    pub concurrency: usize,
    pub run_timeout: Option<Duration>,
}

impl RunContext {
    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let executor = CallExecutor::new(config.request.clone(), config.expected_status, config.retry)?;

        Ok(Self {
            fixture_root: config.fixture_dir.clone(),
            endpoint: config.endpoint.clone(),
            executor,
            max_scan_depth: config.max_scan_depth,
            concurrency: config.concurrency.max(1),
            run_timeout: config.run_timeout,
        })
    }
}

pub struct Runner {
    context: Arc<RunContext>,
    sinks: Vec<Box<dyn ReportSink>>,
}

impl Runner {
    pub fn new(context: RunContext) -> Self {
        Self {
            context: Arc::new(context),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub async fn run(mut self) -> Result<RunSummary, HarnessError> {
        let root = self.context.fixture_root.clone();
        if !root.is_dir() {
            return Err(HarnessError::FixtureRoot(root));
        }

        info!("API TEST AUTOMATION STARTED");
        info!(
            root = %root.display(),
            endpoint = %self.context.endpoint,
            concurrency = self.context.concurrency,
            "running fixtures"
        );

        let fixtures = locate(&root, self.context.max_scan_depth);
        info!(count = fixtures.len(), "discovered request fixtures");

        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = self.context.run_timeout.map(|timeout| started + timeout);

        let results = if self.context.concurrency <= 1 {
            self.run_sequential(fixtures, deadline).await
        } else {
            self.run_parallel(fixtures, deadline).await
        };

        let summary = RunSummary::new(started_at, Utc::now(), elapsed_ms(started), results);
        info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            duration_ms = summary.duration_ms,
            "API TEST AUTOMATION COMPLETED"
        );

        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.finish(&summary) {
                error!(error = %err, "report sink failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(summary),
        }
    }

    async fn run_sequential(&mut self, fixtures: Vec<RequestFixture>, deadline: Option<Instant>) -> Vec<CaseOutcome> {
        let mut results = Vec::with_capacity(fixtures.len());
        for fixture in &fixtures {
            let outcome = if deadline_passed(deadline) {
                deadline_skip(fixture)
            } else {
                run_case(&self.context, fixture).await
            };
            self.forward(&outcome);
            results.push(outcome);
        }
        results
    }

    /// At most `concurrency` cases in flight. Outcomes reach the sinks in
    /// completion order; the returned list is in discovery order.
    async fn run_parallel(&mut self, fixtures: Vec<RequestFixture>, deadline: Option<Instant>) -> Vec<CaseOutcome> {
        let mut slots: Vec<Option<CaseOutcome>> = vec![None; fixtures.len()];
        let mut queue = fixtures.into_iter().enumerate();
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<task::Id, (usize, RequestFixture)> = HashMap::new();

        loop {
            while tasks.len() < self.context.concurrency {
                let Some((index, fixture)) = queue.next() else {
                    break;
                };
                if deadline_passed(deadline) {
                    let outcome = deadline_skip(&fixture);
                    self.forward(&outcome);
                    slots[index] = Some(outcome);
                    continue;
                }

                let context = Arc::clone(&self.context);
                let task_fixture = fixture.clone();
                let handle = tasks.spawn(async move { run_case(&context, &task_fixture).await });
                pending.insert(handle.id(), (index, fixture));
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };
            let (id, result) = match joined {
                Ok((id, outcome)) => (id, Ok(outcome)),
                Err(err) => (err.id(), Err(err)),
            };
            let Some((index, fixture)) = pending.remove(&id) else {
                continue;
            };

            let outcome = result.unwrap_or_else(|err| aborted(&fixture, &err));
            self.forward(&outcome);
            slots[index] = Some(outcome);
        }

        slots.into_iter().flatten().collect()
    }

    fn forward(&mut self, outcome: &CaseOutcome) {
        for sink in &mut self.sinks {
            sink.record(outcome);
        }
    }
}

/// Run one test case to its outcome. Never fails; every problem becomes the
/// case's verdict.
pub async fn run_case(context: &RunContext, fixture: &RequestFixture) -> CaseOutcome {
    let started = Instant::now();
    let mut steps = Vec::new();

    let (case_id, outcome) = match extract_case_id(&fixture.file_name) {
        Ok(case_id) => {
            let outcome = execute_case(context, fixture, &case_id, &mut steps).await;
            (case_id.to_string(), outcome)
        }
        Err(err) => (
            fixture.file_name.clone(),
            Outcome::skip(SkipReason::MalformedIdentifier, err.to_string()),
        ),
    };

    match &outcome {
        Outcome::Pass => info!(case = %case_id, "PASS"),
        Outcome::Fail(failure) => error!(case = %case_id, reason = failure.kind.as_str(), detail = %failure.detail, "FAIL"),
        Outcome::Skip { reason, detail } => warn!(case = %case_id, reason = reason.as_str(), %detail, "SKIP"),
    }

    CaseOutcome {
        case_id,
        fixture: fixture.path(),
        outcome,
        duration_ms: elapsed_ms(started),
        steps,
    }
}

async fn execute_case(
    context: &RunContext,
    fixture: &RequestFixture,
    case_id: &CaseId,
    steps: &mut Vec<String>,
) -> Outcome {
    info!(case = %case_id, "API automation for Test Name = {case_id}");

    let request = match load_document(&fixture.dir, &fixture.file_name) {
        Ok(document) => document,
        Err(err) => return fixture_outcome(err, SkipReason::NoRequestFixture),
    };

    steps.push(format!("Performing API call for: {}", context.endpoint));
    let result = match context.executor.execute(&context.endpoint, &request).await {
        Ok(result) => result,
        Err(err) => return Outcome::fail(FailureKind::CallFailure, error_chain(&err)),
    };
    steps.push(format!(
        "Received status {} from {} in {} ms",
        result.status, result.endpoint, result.duration_ms
    ));

    let expected = match load_document(&fixture.dir, &case_id.response_file_name()) {
        Ok(document) => document,
        Err(err) => return fixture_outcome(err, SkipReason::NoExpectedFixture),
    };

    steps.push("Comparing the Actual Response and Expected Response".to_string());
    verdict(Some(&result.document), Some(&expected))
}

fn fixture_outcome(err: FixtureError, missing: SkipReason) -> Outcome {
    match err {
        FixtureError::NotFound { .. } => Outcome::skip(missing, err.to_string()),
        FixtureError::Parse { .. } => Outcome::fail(FailureKind::FixtureParseError, err.to_string()),
        FixtureError::MalformedName { .. } => Outcome::skip(SkipReason::MalformedIdentifier, err.to_string()),
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

fn deadline_skip(fixture: &RequestFixture) -> CaseOutcome {
    unrun_case(fixture, Outcome::skip(SkipReason::DeadlineExceeded, "run deadline passed before the case started"))
}

fn aborted(fixture: &RequestFixture, err: &JoinError) -> CaseOutcome {
    unrun_case(fixture, Outcome::fail(FailureKind::Aborted, format!("case task did not complete: {err}")))
}

fn unrun_case(fixture: &RequestFixture, outcome: Outcome) -> CaseOutcome {
    let case_id = extract_case_id(&fixture.file_name)
        .map(|id| id.to_string())
        .unwrap_or_else(|_| fixture.file_name.clone());
    warn!(case = %case_id, %outcome, "case has no result of its own");

    CaseOutcome {
        case_id,
        fixture: fixture.path(),
        outcome,
        duration_ms: 0,
        steps: Vec::new(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMethod;
    use crate::http::{ExpectedStatus, RequestSpec, RetryPolicy};
    use crate::report::ReportError;
    use crate::testing::Failure;
    use axum::Router;
    use axum::routing::post;
    use serde_json::{Value, json};
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn spawn_server() -> String {
        spawn_counting_server().await.0
    }

    /// Login stub that also counts the requests it receives.
    async fn spawn_counting_server() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/login",
            post(move |body: String| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                    match request["user"].as_str() {
                        Some("a") => json!({"status": "ok"}).to_string(),
                        Some(user) => json!({"status": "error", "user": user}).to_string(),
                        None => json!({"status": "anonymous"}).to_string(),
                    }
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn context(base_uri: &str, root: &Path) -> RunContext {
        let spec = RequestSpec {
            base_uri: base_uri.to_string(),
            base_path: "/api".to_string(),
            content_type: "application/json".to_string(),
            headers: Vec::new(),
            auth: AuthMethod::None,
            timeout: Duration::from_secs(5),
        };
        RunContext {
            fixture_root: root.to_path_buf(),
            endpoint: "/login".to_string(),
            executor: CallExecutor::new(spec, ExpectedStatus::default(), RetryPolicy::default()).unwrap(),
            max_scan_depth: 8,
            concurrency: 1,
            run_timeout: None,
        }
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// The five documented scenarios in one tree.
    fn scenario_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "T1-request.json", r#"{"user":"a"}"#);
        write(root, "T1-response.json", r#"{"status":"ok"}"#);
        write(root, "T2-request.json", r#"{"user":"a"}"#);
        write(root, "a/sub/T3-request.json", r#"{"user":"b"}"#);
        write(root, "a/sub/T3-response.json", r#"{"status":"error","user":"b"}"#);
        write(root, "T4-request.json", r#"{"user": "a""#);
        write(root, "T4-response.json", r#"{"status":"ok"}"#);
        write(root, "T5-request.json", r#"{"user":"c"}"#);
        write(root, "T5-response.json", r#"{"status":"ok"}"#);
        dir
    }

    fn outcomes(summary: &RunSummary) -> Vec<(String, String)> {
        summary
            .results
            .iter()
            .map(|r| (r.case_id.clone(), r.outcome.reason().unwrap_or("pass").to_string()))
            .collect()
    }

    #[derive(Clone, Default)]
    struct Recorder {
        recorded: Arc<Mutex<Vec<String>>>,
        finished: Arc<Mutex<Option<usize>>>,
    }

    impl ReportSink for Recorder {
        fn record(&mut self, outcome: &CaseOutcome) {
            self.recorded.lock().unwrap().push(outcome.case_id.clone());
        }

        fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
            *self.finished.lock().unwrap() = Some(summary.total);
            Ok(())
        }
    }

    struct FailingSink;

    impl ReportSink for FailingSink {
        fn record(&mut self, _outcome: &CaseOutcome) {}

        fn finish(&mut self, _summary: &RunSummary) -> Result<(), ReportError> {
            Err(ReportError::Output(std::io::Error::other("disk full")))
        }
    }

    #[tokio::test]
    async fn every_case_gets_exactly_one_outcome() {
        let base = spawn_server().await;
        let dir = scenario_tree();

        let summary = Runner::new(context(&base, dir.path())).run().await.unwrap();
        assert_eq!(
            outcomes(&summary),
            vec![
                ("T1".to_string(), "pass".to_string()),
                ("T2".to_string(), "no-expected-fixture".to_string()),
                ("T4".to_string(), "fixture-parse-error".to_string()),
                ("T5".to_string(), "comparison-mismatch".to_string()),
                ("T3".to_string(), "pass".to_string()),
            ]
        );
        assert_eq!((summary.total, summary.passed, summary.failed, summary.skipped), (5, 2, 2, 1));
        assert!(summary.has_failures());
    }

    #[tokio::test]
    async fn mismatch_reports_first_differing_path() {
        let base = spawn_server().await;
        let dir = TempDir::new().unwrap();
        write(dir.path(), "T1-request.json", r#"{"user":"b"}"#);
        write(dir.path(), "T1-response.json", r#"{"status":"ok","user":"b"}"#);

        let summary = Runner::new(context(&base, dir.path())).run().await.unwrap();
        match &summary.results[0].outcome {
            Outcome::Fail(Failure { kind, detail, .. }) => {
                assert_eq!(*kind, FailureKind::ComparisonMismatch);
                assert_eq!(detail, r#"$.status: expected "ok", got "error""#);
            }
            other => panic!("expected mismatch, got {other}"),
        }
    }

    #[tokio::test]
    async fn steps_describe_the_case() {
        let base = spawn_server().await;
        let dir = TempDir::new().unwrap();
        write(dir.path(), "T1-request.json", r#"{"user":"a"}"#);
        write(dir.path(), "T1-response.json", r#"{"status":"ok"}"#);

        let context = context(&base, dir.path());
        let fixture = RequestFixture {
            dir: dir.path().to_path_buf(),
            file_name: "T1-request.json".to_string(),
        };
        let outcome = run_case(&context, &fixture).await;
        assert!(outcome.outcome.is_pass());
        assert_eq!(outcome.steps[0], "Performing API call for: /login");
        assert!(outcome.steps[1].starts_with("Received status 200 from "));
        assert_eq!(outcome.steps[2], "Comparing the Actual Response and Expected Response");
    }

    #[tokio::test]
    async fn malformed_identifier_is_skipped() {
        let base = spawn_server().await;
        let dir = TempDir::new().unwrap();
        write(dir.path(), "LOGIN-2-request.json", r#"{"user":"a"}"#);

        let summary = Runner::new(context(&base, dir.path())).run().await.unwrap();
        assert_eq!(summary.results[0].case_id, "LOGIN-2-request.json");
        assert_eq!(summary.results[0].outcome.reason(), Some("malformed-identifier"));
    }

    #[tokio::test]
    async fn vanished_request_fixture_is_skipped_without_a_call() {
        let (base, hits) = spawn_counting_server().await;
        let dir = TempDir::new().unwrap();
        write(dir.path(), "T1-response.json", r#"{"status":"ok"}"#);
        let fixture = RequestFixture {
            dir: dir.path().to_path_buf(),
            file_name: "T1-request.json".to_string(),
        };

        let outcome = run_case(&context(&base, dir.path()), &fixture).await;
        assert_eq!(outcome.case_id, "T1");
        assert_eq!(outcome.outcome.label(), "SKIP");
        assert_eq!(outcome.outcome.reason(), Some("no-request-fixture"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unparsable_expected_fixture_fails_after_the_call() {
        let (base, hits) = spawn_counting_server().await;
        let dir = TempDir::new().unwrap();
        write(dir.path(), "T1-request.json", r#"{"user":"a"}"#);
        write(dir.path(), "T1-response.json", r#"{"status": "ok""#);
        let fixture = RequestFixture {
            dir: dir.path().to_path_buf(),
            file_name: "T1-request.json".to_string(),
        };

        let outcome = run_case(&context(&base, dir.path()), &fixture).await;
        assert_eq!(outcome.outcome.label(), "FAIL");
        assert_eq!(outcome.outcome.reason(), Some("fixture-parse-error"));
        assert!(outcome.outcome.detail().unwrap_or_default().contains("T1-response.json"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_each_case_and_continues() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = TempDir::new().unwrap();
        write(dir.path(), "T1-request.json", r#"{"user":"a"}"#);
        write(dir.path(), "T2-request.json", r#"{"user":"a"}"#);

        let summary = Runner::new(context(&format!("http://{addr}"), dir.path())).run().await.unwrap();
        assert_eq!(summary.failed, 2);
        assert!(summary.results.iter().all(|r| r.outcome.reason() == Some("call-failure")));
    }

    #[tokio::test]
    async fn parallel_run_matches_sequential_order() {
        let base = spawn_server().await;
        let dir = scenario_tree();

        let sequential = Runner::new(context(&base, dir.path())).run().await.unwrap();
        let mut parallel_context = context(&base, dir.path());
        parallel_context.concurrency = 3;
        let parallel = Runner::new(parallel_context).run().await.unwrap();

        assert_eq!(outcomes(&sequential), outcomes(&parallel));
    }

    #[tokio::test]
    async fn expired_deadline_skips_unstarted_cases() {
        let base = spawn_server().await;
        let dir = scenario_tree();
        let mut context = context(&base, dir.path());
        context.run_timeout = Some(Duration::ZERO);

        let summary = Runner::new(context).run().await.unwrap();
        assert_eq!(summary.skipped, 5);
        assert!(summary.results.iter().all(|r| r.outcome.reason() == Some("deadline-exceeded")));
    }

    #[tokio::test]
    async fn sinks_see_every_outcome_then_finish() {
        let base = spawn_server().await;
        let dir = scenario_tree();
        let recorder = Recorder::default();

        let mut context = context(&base, dir.path());
        context.concurrency = 2;
        Runner::new(context).with_sink(recorder.clone()).run().await.unwrap();

        let mut recorded = recorder.recorded.lock().unwrap().clone();
        recorded.sort();
        assert_eq!(recorded, vec!["T1", "T2", "T3", "T4", "T5"]);
        assert_eq!(*recorder.finished.lock().unwrap(), Some(5));
    }

    #[tokio::test]
    async fn failing_sink_is_fatal_after_all_sinks_finish() {
        let base = spawn_server().await;
        let dir = scenario_tree();
        let recorder = Recorder::default();

        let err = Runner::new(context(&base, dir.path()))
            .with_sink(FailingSink)
            .with_sink(recorder.clone())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Report(ReportError::Output(_))));
        assert_eq!(*recorder.finished.lock().unwrap(), Some(5));
    }

    #[tokio::test]
    async fn missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = Runner::new(context("http://127.0.0.1:1", &dir.path().join("absent")))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::FixtureRoot(_)));
    }

    #[tokio::test]
    async fn empty_root_is_an_empty_run() {
        let dir = TempDir::new().unwrap();
        let summary = Runner::new(context("http://127.0.0.1:1", dir.path())).run().await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(!summary.has_failures());
    }
}
