//! Output formatting for CLI commands.
//!
//! Text output is meant for people: one line per outcome, colors keyed to the
//! outcome status. JSON output is meant for scripts and keeps every field a
//! caller might branch on, such as `status`, `reason` and `error.kind`.

mod color;

use deplink::domain::{
    DependencyView, IssueRef, IssueSummary, OperationOutcome, OperationReport, OutcomeStatus,
    Rejection,
};
use deplink::error::OperationError;
use serde::Serialize;
use serde_json::{Value, json};
use std::env;
use std::io::{self, Write};

use color::{bold, colorize_state, dimmed, error, info, status_marker, warning};

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use ASCII-only markers instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new OutputConfig with explicit values.
    pub fn new(use_ascii: bool, use_colors: bool) -> Self {
        Self {
            use_ascii,
            use_colors,
        }
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `DEPLINK_ASCII`: Set to "1" or "true" for ASCII-only markers (default: false)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `DEPLINK_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        let use_ascii = match env::var("DEPLINK_ASCII") {
            Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Ok(v) => {
                tracing::warn!(
                    env_var = "DEPLINK_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            Err(_) => false,
        };

        // Respect NO_COLOR (https://no-color.org/)
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("DEPLINK_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            use_ascii,
            use_colors,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Print an operation report in the specified format
pub fn print_report(report: &OperationReport, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&report_json(report)),
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_report_text(&mut handle, report, &OutputConfig::from_env())
        }
    }
}

/// Print an error that stopped the whole operation
pub fn print_operation_error(err: &OperationError, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&json!({ "error": error_json(err) })),
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            let stderr = io::stderr();
            let mut handle = stderr.lock();
            writeln!(handle, "{} {err}", error("error:", &config))
        }
    }
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

// ============================================================================
// Text Formatting
// ============================================================================

/// Render a report as text.
pub fn write_report_text<W: Write>(
    w: &mut W,
    report: &OperationReport,
    config: &OutputConfig,
) -> io::Result<()> {
    match report {
        OperationReport::View(view) => write_view_text(w, view, config),
        OperationReport::Batch(outcomes) => write_outcomes_text(w, outcomes, config),
    }
}

fn write_summary_line<W: Write>(
    w: &mut W,
    summary: &IssueSummary,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {} [{}]",
        info(&summary.reference.key(), config),
        summary.title,
        colorize_state(summary.state, config)
    )
}

fn write_section<W: Write>(
    w: &mut W,
    title: &str,
    related: &[IssueSummary],
    config: &OutputConfig,
) -> io::Result<()> {
    if related.is_empty() {
        return writeln!(w, "  {} {}", bold(&format!("{title}:"), config), dimmed("none", config));
    }
    writeln!(w, "  {}", bold(&format!("{title} ({}):", related.len()), config))?;
    for summary in related {
        write!(w, "    ")?;
        write_summary_line(w, summary, config)?;
    }
    Ok(())
}

fn write_view_text<W: Write>(
    w: &mut W,
    view: &DependencyView,
    config: &OutputConfig,
) -> io::Result<()> {
    write_summary_line(w, &view.target, config)?;
    write_section(w, "Blocked by", &view.blocked_by, config)?;
    write_section(w, "Blocks", &view.blocks, config)
}

fn write_outcomes_text<W: Write>(
    w: &mut W,
    outcomes: &[OperationOutcome],
    config: &OutputConfig,
) -> io::Result<()> {
    if outcomes.is_empty() {
        return writeln!(w, "Nothing to do.");
    }

    for outcome in outcomes {
        let detail = match &outcome.status {
            OutcomeStatus::Failed(_) => error(&outcome.detail, config),
            OutcomeStatus::Rejected(_) => warning(&outcome.detail, config),
            _ => outcome.detail.clone(),
        };
        writeln!(
            w,
            "{} {}: {detail}",
            status_marker(&outcome.status, config),
            outcome.input
        )?;
    }

    writeln!(w, "{}", dimmed(&tally(outcomes), config))
}

/// Counts per status label in first-seen order, e.g. `2 created, 1 rejected`.
fn tally(outcomes: &[OperationOutcome]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for outcome in outcomes {
        let label = outcome.status.label();
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
        .iter()
        .map(|(label, n)| format!("{n} {}", label.replace('_', " ")))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// JSON Formatting
// ============================================================================

/// JSON document for a report.
pub fn report_json(report: &OperationReport) -> Value {
    match report {
        OperationReport::View(view) => view_json(view),
        OperationReport::Batch(outcomes) => json!({
            "results": outcomes.iter().map(outcome_json).collect::<Vec<_>>(),
            "has_failures": report.has_failures(),
        }),
    }
}

fn summary_json(summary: &IssueSummary) -> Value {
    json!({
        "key": summary.reference.key(),
        "owner": summary.reference.owner,
        "repo": summary.reference.repo,
        "number": summary.reference.number,
        "id": summary.remote_id,
        "title": summary.title,
        "state": summary.state,
    })
}

fn view_json(view: &DependencyView) -> Value {
    json!({
        "issue": summary_json(&view.target),
        "blocked_by": view.blocked_by.iter().map(summary_json).collect::<Vec<_>>(),
        "blocks": view.blocks.iter().map(summary_json).collect::<Vec<_>>(),
    })
}

fn error_json(err: &OperationError) -> Value {
    json!({
        "kind": err.kind(),
        "message": err.to_string(),
        "transient": err.is_transient(),
    })
}

fn outcome_json(outcome: &OperationOutcome) -> Value {
    let mut value = json!({
        "input": outcome.input,
        "target": outcome.target.as_ref().map(IssueRef::key),
        "status": outcome.status.label(),
        "detail": outcome.detail,
    });
    match &outcome.status {
        OutcomeStatus::Rejected(rejection) => {
            value["reason"] = rejection_reason(rejection);
            if let Rejection::WouldCreateCycle { path } = rejection {
                value["cycle"] = json!(path.iter().map(IssueRef::key).collect::<Vec<_>>());
            }
        }
        OutcomeStatus::Failed(err) => value["error"] = error_json(err),
        _ => {}
    }
    value
}

fn rejection_reason(rejection: &Rejection) -> Value {
    let label = match rejection {
        Rejection::SelfReference => "self_reference",
        Rejection::DuplicateEdge => "duplicate_edge",
        Rejection::WouldCreateCycle { .. } => "would_create_cycle",
        Rejection::RelationshipNotFound => "relationship_not_found",
    };
    Value::from(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deplink::domain::IssueState;
    use deplink::error::{ErrorKind, RepoError, TransportError};

    fn plain() -> OutputConfig {
        OutputConfig::new(false, false)
    }

    fn summary(number: u64, title: &str) -> IssueSummary {
        IssueSummary {
            reference: IssueRef::new("acme", "widgets", number),
            remote_id: 9000 + number,
            title: title.to_string(),
            state: IssueState::Open,
        }
    }

    fn outcome(input: &str, status: OutcomeStatus, detail: &str) -> OperationOutcome {
        OperationOutcome {
            input: input.to_string(),
            target: Some(IssueRef::new("acme", "widgets", input.parse().unwrap_or(1))),
            status,
            detail: detail.to_string(),
        }
    }

    fn render(report: &OperationReport) -> String {
        let mut buf = Vec::new();
        write_report_text(&mut buf, report, &plain()).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ========== Text ==========

    #[test]
    fn test_view_text_lists_both_directions() {
        let view = DependencyView {
            target: summary(100, "Ship it"),
            blocked_by: vec![summary(45, "Design"), summary(67, "Review")],
            blocks: vec![],
        };
        let text = render(&OperationReport::View(view));

        assert_eq!(
            text,
            "acme/widgets#100 Ship it [open]\n\
             \x20 Blocked by (2):\n\
             \x20   acme/widgets#45 Design [open]\n\
             \x20   acme/widgets#67 Review [open]\n\
             \x20 Blocks: none\n"
        );
    }

    #[test]
    fn test_batch_text_with_tally() {
        let outcomes = vec![
            outcome("45", OutcomeStatus::Created, "added: acme/widgets#100 blocked by acme/widgets#45"),
            outcome(
                "67",
                OutcomeStatus::Rejected(Rejection::DuplicateEdge),
                "relationship already exists",
            ),
            outcome("68", OutcomeStatus::Created, "added: acme/widgets#100 blocked by acme/widgets#68"),
        ];
        let text = render(&OperationReport::Batch(outcomes));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("✓ 45: added"));
        assert_eq!(lines[1], "✗ 67: relationship already exists");
        assert_eq!(lines[3], "2 created, 1 rejected");
    }

    #[test]
    fn test_empty_batch_text() {
        assert_eq!(render(&OperationReport::Batch(vec![])), "Nothing to do.\n");
    }

    // ========== JSON ==========

    #[test]
    fn test_cycle_rejection_json() {
        let path = vec![
            IssueRef::new("acme", "widgets", 67),
            IssueRef::new("acme", "widgets", 45),
            IssueRef::new("acme", "widgets", 100),
        ];
        let rejection = Rejection::WouldCreateCycle { path };
        let detail = rejection.to_string();
        let report = OperationReport::Batch(vec![outcome(
            "100",
            OutcomeStatus::Rejected(rejection),
            &detail,
        )]);

        let value = report_json(&report);
        let result = &value["results"][0];
        assert_eq!(result["status"], "rejected");
        assert_eq!(result["reason"], "would_create_cycle");
        assert_eq!(
            result["cycle"],
            json!(["acme/widgets#67", "acme/widgets#45", "acme/widgets#100"])
        );
        assert_eq!(value["has_failures"], true);
    }

    #[test]
    fn test_failure_json_carries_kind_and_transience() {
        let err = OperationError::from(RepoError::Transport(TransportError::RateLimited {
            attempts: 5,
        }));
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        let detail = err.to_string();
        let report = OperationReport::Batch(vec![outcome("45", OutcomeStatus::Failed(err), &detail)]);

        let value = report_json(&report);
        let error = &value["results"][0]["error"];
        assert_eq!(error["kind"], "rate_limited");
        assert_eq!(error["transient"], true);
    }

    #[test]
    fn test_view_json_shape() {
        let view = DependencyView {
            target: summary(100, "Ship it"),
            blocked_by: vec![summary(45, "Design")],
            blocks: vec![],
        };
        let value = report_json(&OperationReport::View(view));

        assert_eq!(value["issue"]["key"], "acme/widgets#100");
        assert_eq!(value["issue"]["state"], "open");
        assert_eq!(value["blocked_by"][0]["number"], 45);
        assert_eq!(value["blocks"], json!([]));
    }
}
