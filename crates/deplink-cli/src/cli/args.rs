//! Command argument structs.

use clap::{ArgGroup, Args};
use deplink::domain::{OperationRequest, RelationshipKind};

use super::validators::validate_issue;

/// Arguments for the list command
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Issue to inspect (`123`, `#123`, `owner/repo#123` or an issue URL)
    #[arg(value_parser = validate_issue)]
    pub issue: String,
}

impl ListArgs {
    /// Request for this invocation.
    pub fn request(&self) -> OperationRequest {
        OperationRequest::list(&self.issue)
    }
}

/// Arguments for the add command
#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("relationship")
        .required(true)
        .args(["blocked_by", "blocks"])
))]
pub struct AddArgs {
    /// Issue the relationships are added to
    #[arg(value_parser = validate_issue)]
    pub issue: String,

    /// Issues that must be finished before this one (comma-separated)
    #[arg(long, value_delimiter = ',', num_args = 1.., value_name = "ISSUES")]
    pub blocked_by: Vec<String>,

    /// Issues that cannot start until this one is finished (comma-separated)
    #[arg(long, value_delimiter = ',', num_args = 1.., value_name = "ISSUES")]
    pub blocks: Vec<String>,

    /// Validate and report without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl AddArgs {
    /// Request for this invocation.
    pub fn request(&self) -> OperationRequest {
        let (kind, targets) = if self.blocks.is_empty() {
            (RelationshipKind::BlockedBy, &self.blocked_by)
        } else {
            (RelationshipKind::Blocks, &self.blocks)
        };
        let request = OperationRequest::add(&self.issue, kind, targets.iter().map(|t| t.trim()));
        if self.dry_run { request.dry_run() } else { request }
    }
}

/// Arguments for the remove command
///
/// `--all` removes every relationship of the issue in both directions. Adding
/// `--blocked-by` or `--blocks` without values narrows it to that kind.
#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    /// Issue the relationships are removed from
    #[arg(value_parser = validate_issue)]
    pub issue: String,

    /// Prerequisites to detach (comma-separated)
    #[arg(
        long,
        value_delimiter = ',',
        num_args = 0..,
        value_name = "ISSUES",
        conflicts_with = "blocks"
    )]
    pub blocked_by: Option<Vec<String>>,

    /// Dependents to detach (comma-separated)
    #[arg(long, value_delimiter = ',', num_args = 0.., value_name = "ISSUES")]
    pub blocks: Option<Vec<String>>,

    /// Remove every relationship of the issue
    #[arg(long)]
    pub all: bool,

    /// Validate and report without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

impl RemoveArgs {
    /// Request for this invocation.
    ///
    /// # Errors
    ///
    /// Returns a usage message when the flags do not name exactly one
    /// non-empty target list, or `--all` is combined with explicit targets.
    pub fn request(&self) -> Result<OperationRequest, String> {
        let (kind, targets): (Option<RelationshipKind>, &[String]) =
            match (&self.blocked_by, &self.blocks) {
                (_, Some(blocks)) => (Some(RelationshipKind::Blocks), blocks.as_slice()),
                (Some(blocked_by), None) => {
                    (Some(RelationshipKind::BlockedBy), blocked_by.as_slice())
                }
                (None, None) => (None, &[]),
            };

        let request = if self.all {
            if !targets.is_empty() {
                return Err("--all cannot be combined with explicit targets".to_string());
            }
            match kind {
                Some(kind) => {
                    OperationRequest::remove(&self.issue, kind, Vec::<String>::new()).all_of_kind()
                }
                None => OperationRequest::remove(
                    &self.issue,
                    RelationshipKind::BlockedBy,
                    Vec::<String>::new(),
                )
                .all(),
            }
        } else {
            if targets.is_empty() {
                return Err(
                    "Specify issues with --blocked-by or --blocks, or use --all".to_string()
                );
            }
            let kind = kind.unwrap_or(RelationshipKind::BlockedBy);
            OperationRequest::remove(&self.issue, kind, targets.iter().map(|t| t.trim()))
        };

        let request = if self.dry_run { request.dry_run() } else { request };
        Ok(if self.force { request.confirmed() } else { request })
    }
}
