//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success:   green  (created, removed, closed issues)
//!   - Warning:   yellow (rejections, pending confirmation)
//!   - Error:     red    (failures)
//!   - Info:      cyan   (issue references, dry-run changes)
//!   - Muted:     dimmed (section labels)

use colored::Colorize;
use deplink::domain::{IssueState, OutcomeStatus};

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

/// Dim secondary text.
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Bold section headers.
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

/// Issue state, green once closed.
pub(crate) fn colorize_state(state: IssueState, config: &OutputConfig) -> String {
    match state {
        IssueState::Open => "open".to_string(),
        IssueState::Closed => success("closed", config),
    }
}

/// Marker printed in front of a batch outcome.
pub(crate) fn status_marker(status: &OutcomeStatus, config: &OutputConfig) -> String {
    let (ascii, unicode) = match status {
        OutcomeStatus::Created | OutcomeStatus::Removed => ("+", "✓"),
        OutcomeStatus::WouldChange => ("~", "~"),
        OutcomeStatus::RequiresConfirmation => ("?", "?"),
        OutcomeStatus::Rejected(_) | OutcomeStatus::Failed(_) => ("x", "✗"),
    };
    let marker = if config.use_ascii { ascii } else { unicode };
    match status {
        OutcomeStatus::Created | OutcomeStatus::Removed => success(marker, config),
        OutcomeStatus::WouldChange => info(marker, config),
        OutcomeStatus::RequiresConfirmation | OutcomeStatus::Rejected(_) => {
            warning(marker, config)
        }
        OutcomeStatus::Failed(_) => error(marker, config),
    }
}
