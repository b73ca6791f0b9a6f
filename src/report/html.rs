use chrono::{DateTime, Utc};
use tracing::info;

use super::style;
use super::{ReportError, ReportSink};
use crate::config::ReportConfig;
use crate::storage;
use crate::testing::{CaseOutcome, Outcome, RunSummary};

/// Self-contained HTML report, written when the run finishes.
#[derive(Debug, Clone)]
pub struct HtmlReport {
    config: ReportConfig,
}

impl HtmlReport {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    pub fn render(&self, summary: &RunSummary) -> String {
        let title = escape_html(&self.config.title);
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{title}</title>\n<style>\n{}</style>\n</head>\n<body>\n", style::stylesheet()));
        html.push_str(&format!(
            "<header><h1>{title}</h1><div class=\"muted\">Started {} &middot; finished {} &middot; {} ms</div></header>\n<main>\n",
            format_utc(&summary.started_at),
            format_utc(&summary.finished_at),
            summary.duration_ms,
        ));

        html.push_str("<section class=\"cards\">\n");
        for (label, value) in [
            ("Total", summary.total),
            ("Passed", summary.passed),
            ("Failed", summary.failed),
            ("Skipped", summary.skipped),
        ] {
            html.push_str(&format!(
                "<div class=\"card\"><div class=\"muted\">{label}</div><div class=\"value\">{value}</div></div>\n"
            ));
        }
        html.push_str("</section>\n");

        if !self.config.system_info.is_empty() {
            html.push_str("<table class=\"info\">\n<tr><th>Name</th><th>Value</th></tr>\n");
            for (name, value) in &self.config.system_info {
                html.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td></tr>\n",
                    escape_html(name),
                    escape_html(value)
                ));
            }
            html.push_str("</table>\n");
        }

        html.push_str("<section class=\"tests\">\n");
        for result in &summary.results {
            render_case(&mut html, result);
        }
        html.push_str("</section>\n</main>\n</body>\n</html>\n");

        html
    }
}

impl ReportSink for HtmlReport {
    fn record(&mut self, _outcome: &CaseOutcome) {}

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let path = &self.config.path;
        storage::write_text(path, &self.render(summary)).map_err(|source| ReportError::Write {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "HTML report generated");
        Ok(())
    }
}

fn render_case(html: &mut String, result: &CaseOutcome) {
    let status = result.outcome.label().to_ascii_lowercase();

    html.push_str(&format!("<article class=\"test {status}\">\n<div class=\"test-head\">"));
    html.push_str(&format!(
        "<span class=\"label {status}\">{}</span><h2>API automation for Test Name = {}</h2><span class=\"muted\">{} ms</span></div>\n",
        result.outcome.label(),
        escape_html(&result.case_id),
        result.duration_ms,
    ));
    html.push_str(&format!(
        "<div class=\"muted\">{}</div>\n",
        escape_html(&result.fixture.display().to_string())
    ));

    if !result.steps.is_empty() {
        html.push_str("<ul class=\"steps\">\n");
        for step in &result.steps {
            html.push_str(&format!("<li>{}</li>\n", escape_html(step)));
        }
        html.push_str("</ul>\n");
    }

    match &result.outcome {
        Outcome::Pass => {}
        Outcome::Fail(failure) => {
            html.push_str(&format!(
                "<details><summary>{}: click to see details</summary>\n<pre>{}</pre>\n",
                failure.kind.as_str(),
                escape_html(&failure.detail)
            ));
            if !failure.differences.is_empty() {
                html.push_str("<table>\n<tr><th>Path</th><th>Difference</th><th>Expected</th><th>Actual</th></tr>\n");
                for difference in &failure.differences {
                    let expected = difference.expected.as_ref().map(|v| v.to_string()).unwrap_or_default();
                    let actual = difference.actual.as_ref().map(|v| v.to_string()).unwrap_or_default();
                    html.push_str(&format!(
                        "<tr><td><code>{}</code></td><td>{}</td><td><code>{}</code></td><td><code>{}</code></td></tr>\n",
                        escape_html(&difference.path),
                        difference.kind.as_str(),
                        escape_html(&expected),
                        escape_html(&actual),
                    ));
                }
                html.push_str("</table>\n");
            }
            html.push_str("</details>\n");
        }
        Outcome::Skip { reason, detail } => {
            html.push_str(&format!(
                "<p class=\"muted\">Skipped ({}): {}</p>\n",
                reason.as_str(),
                escape_html(detail)
            ));
        }
    }

    html.push_str("</article>\n");
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_utc(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
