//! Report rendering.
//!
//! Every renderer returns the text to print so the CLI decides where it
//! goes: reports to stdout, errors to stderr.

use crate::bench::{CheckItem, ItemReport, RunReport, Status};
use nb_common::{OutputFormat, StructuredError};
use serde::Serialize;

/// Render a run report. `Exitcode` renders nothing.
pub fn render_report(report: &RunReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Jsonl => render_jsonl(report)?,
        OutputFormat::Md => render_markdown(report),
        OutputFormat::Summary => render_summary(report),
        OutputFormat::Exitcode => String::new(),
    })
}

/// One line per item, then one summary line.
fn render_jsonl(report: &RunReport) -> Result<String, serde_json::Error> {
    #[derive(Serialize)]
    struct ItemLine<'a> {
        kind: &'static str,
        run_id: &'a str,
        #[serde(flatten)]
        item: &'a ItemReport,
    }

    let mut lines = Vec::with_capacity(report.items.len() + 1);
    for item in &report.items {
        lines.push(serde_json::to_string(&ItemLine {
            kind: "item",
            run_id: &report.run_id,
            item,
        })?);
    }
    lines.push(serde_json::to_string(&serde_json::json!({
        "kind": "summary",
        "schema_version": report.schema_version,
        "run_id": report.run_id,
        "host_id": report.host_id,
        "generated_at": report.generated_at.to_rfc3339(),
        "duration_ms": report.duration_ms,
        "summary": report.summary,
    }))?);
    Ok(lines.join("\n"))
}

fn render_markdown(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("# CIS Kubernetes node benchmark\n\n");
    out.push_str(&format!(
        "Run `{}` on `{}` at {} ({} ms)\n\n",
        report.run_id,
        report.host_id,
        report.generated_at.to_rfc3339(),
        report.duration_ms
    ));
    out.push_str("| Id | Status | Check | Detail |\n");
    out.push_str("|----|--------|-------|--------|\n");
    for item in &report.items {
        let scored = if item.scored { "" } else { " (not scored)" };
        out.push_str(&format!(
            "| {} | {} | {}{} | {} |\n",
            item.id,
            item.status(),
            escape_cell(&item.title),
            scored,
            escape_cell(&item.outcome.message())
        ));
    }
    out.push('\n');
    out.push_str(&render_summary(report));
    out
}

/// `[run-id] FAIL: 7 passed, 1 failed, 2 skipped, 0 errors (10 checks)`
pub fn render_summary(report: &RunReport) -> String {
    let s = &report.summary;
    let verdict = if s.errored > 0 {
        Status::Error
    } else if s.failed > 0 {
        Status::Fail
    } else {
        Status::Pass
    };
    format!(
        "[{}] {}: {} passed, {} failed, {} skipped, {} errors ({} checks)\n",
        report.run_id, verdict, s.passed, s.failed, s.skipped, s.errored, s.total
    )
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[derive(Serialize)]
struct CatalogEntry<'a> {
    id: String,
    title: &'a str,
    scored: bool,
    check: String,
}

/// Render the items a focus selects, without running them.
pub fn render_catalog<'a, I>(items: I, format: OutputFormat) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = &'a CheckItem>,
{
    let entries: Vec<CatalogEntry<'a>> = items
        .into_iter()
        .map(|item| CatalogEntry {
            id: item.id.to_string(),
            title: &item.title,
            scored: item.scored,
            check: item.check.to_string(),
        })
        .collect();

    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "schema_version": nb_common::SCHEMA_VERSION,
            "items": entries,
        }))?,
        OutputFormat::Jsonl => entries
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n"),
        OutputFormat::Md => {
            let mut out = String::from("| Id | Scored | Check | Predicate |\n|----|--------|-------|-----------|\n");
            for e in &entries {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    e.id,
                    if e.scored { "yes" } else { "no" },
                    escape_cell(e.title),
                    escape_cell(&e.check)
                ));
            }
            out
        }
        OutputFormat::Summary => entries
            .iter()
            .map(|e| format!("[{}] {}", e.id, e.title))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Exitcode => String::new(),
    })
}

/// Render an error that stopped the command.
pub fn render_error(err: &nb_common::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let body = serde_json::json!({
                "schema_version": nb_common::SCHEMA_VERSION,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "error",
                "error": StructuredError::from(err),
            });
            if format == OutputFormat::Json {
                serde_json::to_string_pretty(&body).unwrap_or_else(|_| err.to_string())
            } else {
                body.to_string()
            }
        }
        OutputFormat::Exitcode => String::new(),
        OutputFormat::Md | OutputFormat::Summary => nb_common::format_error_human(err, false),
    }
}
