//! CLI input validation functions.
//!
//! These run at parse time through clap's `value_parser`. Targets are not
//! validated here: a malformed target fails on its own without stopping the
//! rest of the batch.

use deplink::domain::RepoIdentity;

/// Validate the issue a command operates on.
///
/// Only emptiness is checked; the full grammar is applied during resolution.
pub fn validate_issue(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Issue reference cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}

/// Validate `--repo` as `OWNER/REPO`.
pub fn validate_repo(s: &str) -> Result<RepoIdentity, String> {
    RepoIdentity::parse(s.trim())
}
