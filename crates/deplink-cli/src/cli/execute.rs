//! Command execution functions.

use anyhow::Result;
use deplink::app::App;
use deplink::domain::{OperationReport, OperationRequest, OutcomeStatus};
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use super::args::{AddArgs, ListArgs, RemoveArgs};
use crate::output::{self, OutputMode};

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Everything requested happened (or would, in a dry run)
    Success,
    /// At least one target was rejected or failed, or the run was aborted
    Failures,
    /// The user declined the confirmation prompt
    Cancelled,
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Success | RunStatus::Cancelled => ExitCode::SUCCESS,
            RunStatus::Failures => ExitCode::FAILURE,
        }
    }
}

fn status_of(report: &OperationReport) -> RunStatus {
    if report.has_failures() {
        RunStatus::Failures
    } else {
        RunStatus::Success
    }
}

/// Execute a request and print whatever it produced.
///
/// Returns the report so callers can act on it, or `None` when the whole
/// operation failed and the error was already printed.
async fn run(
    app: &App,
    request: &OperationRequest,
    output_mode: OutputMode,
) -> Result<Option<OperationReport>> {
    match app.execute(request).await {
        Ok(report) => {
            output::print_report(&report, output_mode)?;
            Ok(Some(report))
        }
        Err(err) => {
            tracing::debug!(error = %err, kind = ?err.kind(), "Operation aborted");
            output::print_operation_error(&err, output_mode)?;
            Ok(None)
        }
    }
}

/// Execute the list command
pub async fn execute_list(
    app: &App,
    args: &ListArgs,
    output_mode: OutputMode,
) -> Result<RunStatus> {
    let report = run(app, &args.request(), output_mode).await?;
    Ok(report.as_ref().map_or(RunStatus::Failures, status_of))
}

/// Execute the add command
pub async fn execute_add(app: &App, args: &AddArgs, output_mode: OutputMode) -> Result<RunStatus> {
    let report = run(app, &args.request(), output_mode).await?;
    Ok(report.as_ref().map_or(RunStatus::Failures, status_of))
}

/// Execute the remove command
///
/// Without `--force` the first pass only plans the removal. In text mode the
/// plan is shown and `confirm` decides whether a confirmed second pass runs;
/// in JSON mode the pending outcomes are the result.
pub async fn execute_remove(
    app: &App,
    args: &RemoveArgs,
    output_mode: OutputMode,
    confirm: impl FnOnce(usize) -> io::Result<bool>,
) -> Result<RunStatus> {
    let request = args.request().map_err(anyhow::Error::msg)?;

    let Some(report) = run(app, &request, output_mode).await? else {
        return Ok(RunStatus::Failures);
    };
    if !report.needs_confirmation() || output_mode == OutputMode::Json {
        return Ok(status_of(&report));
    }

    let pending = match &report {
        OperationReport::Batch(outcomes) => outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::RequiresConfirmation)
            .count(),
        OperationReport::View(_) => 0,
    };
    if !confirm(pending)? {
        println!("Removal cancelled.");
        return Ok(RunStatus::Cancelled);
    }

    let confirmed = request.confirmed();
    let report = run(app, &confirmed, output_mode).await?;
    Ok(report.as_ref().map_or(RunStatus::Failures, status_of))
}

/// Ask on the terminal whether to go ahead with `count` removals.
///
/// A non-interactive stdin counts as "no".
pub fn prompt_removal(count: usize) -> io::Result<bool> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        eprintln!("Not removing anything without confirmation; pass --force to skip the prompt.");
        return Ok(false);
    }

    let noun = if count == 1 { "relationship" } else { "relationships" };
    eprint!("Remove {count} {noun}? [y/N]: ");
    let mut input = String::new();
    stdin.read_line(&mut input)?;
    let response = input.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}
