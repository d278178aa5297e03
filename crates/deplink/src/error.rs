//! Error types for deplink.
//!
//! Each component boundary has its own closed error enum so callers can
//! branch exhaustively on what went wrong:
//!
//! - [`ResolutionError`]: an issue reference could not be parsed
//! - [`TransportError`]: the HTTP exchange with the remote service failed
//! - [`RepoError`]: a dependency repository call failed
//! - [`OperationError`]: a per-target failure reported by the orchestrator
//!
//! Every error maps onto an [`ErrorKind`] from the shared taxonomy.

use crate::domain::{DependencyEdge, IssueRef};
use serde::Serialize;
use std::io;
use thiserror::Error;

/// Taxonomy of failure kinds shared by every error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input could not be parsed
    MalformedInput,
    /// A bare issue number was given without a repository
    MissingRepositoryContext,
    /// Credentials were rejected
    Unauthenticated,
    /// The caller lacks permission
    Forbidden,
    /// An issue or relationship does not exist
    NotFound,
    /// An issue cannot depend on itself
    SelfReference,
    /// The relationship already exists
    DuplicateEdge,
    /// The relationship would close a dependency cycle
    WouldCreateCycle,
    /// The remote service kept rate limiting the request
    RateLimited,
    /// The remote service or network was unavailable
    ServiceUnavailable,
    /// The remote service answered with something unexpected
    UnexpectedRemote,
}

/// Failure to turn user input into an [`IssueRef`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Input is not a number, `owner/repo#number` or issue URL.
    #[error("Invalid issue reference '{input}': {reason}")]
    Malformed {
        /// The raw input
        input: String,
        /// What was wrong with it
        reason: String,
    },

    /// A bare number was given and no current repository is known.
    #[error(
        "Issue reference '{input}' needs a repository: use owner/repo#number or run inside a repository"
    )]
    MissingRepoContext {
        /// The raw input
        input: String,
    },
}

impl ResolutionError {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolutionError::Malformed { .. } => ErrorKind::MalformedInput,
            ResolutionError::MissingRepoContext { .. } => ErrorKind::MissingRepositoryContext,
        }
    }
}

/// Failure of a single remote call, after any retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 401 from the remote service.
    #[error("Authentication failed: the remote service rejected the credentials")]
    Unauthenticated,

    /// 403 from the remote service.
    #[error("Access denied: {message}")]
    Forbidden {
        /// Message returned by the service
        message: String,
    },

    /// 404 from the remote service.
    #[error("Not found")]
    NotFound,

    /// Still rate limited after every retry.
    #[error("Rate limited by the remote service after {attempts} attempts")]
    RateLimited {
        /// Attempts made
        attempts: u32,
    },

    /// Still failing with 5xx or network errors after every retry.
    #[error("Remote service unavailable after {attempts} attempts: {detail}")]
    ServiceUnavailable {
        /// Attempts made
        attempts: u32,
        /// Last status or network failure
        detail: String,
    },

    /// The call's deadline passed.
    #[error("Request timed out after {seconds}s")]
    Timeout {
        /// Deadline length in seconds
        seconds: u64,
    },

    /// Any other status.
    #[error("Unexpected response {status}: {excerpt}")]
    Unexpected {
        /// HTTP status
        status: u16,
        /// Truncated response body
        excerpt: String,
    },

    /// A success response whose body could not be decoded.
    #[error("Could not decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Unauthenticated => ErrorKind::Unauthenticated,
            TransportError::Forbidden { .. } => ErrorKind::Forbidden,
            TransportError::NotFound => ErrorKind::NotFound,
            TransportError::RateLimited { .. } => ErrorKind::RateLimited,
            TransportError::ServiceUnavailable { .. } | TransportError::Timeout { .. } => {
                ErrorKind::ServiceUnavailable
            }
            TransportError::Unexpected { .. } | TransportError::Decode(_) => {
                ErrorKind::UnexpectedRemote
            }
        }
    }

    /// Whether retrying the whole operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::RateLimited { .. }
                | TransportError::ServiceUnavailable { .. }
                | TransportError::Timeout { .. }
        )
    }
}

/// Failure of a dependency repository call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    /// Credentials were rejected; every further call would fail the same way.
    #[error("Authentication failed: run `gh auth login` or set GH_TOKEN")]
    Unauthenticated,

    /// The caller lacks a permission.
    #[error("Permission denied on {repo}: {detail}")]
    Forbidden {
        /// Repository the permission applies to
        repo: String,
        /// The missing permission
        detail: String,
    },

    /// The issue does not exist or is not visible.
    #[error("Issue not found: {0}")]
    IssueNotFound(IssueRef),

    /// The relationship does not exist.
    #[error("Relationship does not exist: {0}")]
    RelationshipNotFound(DependencyEdge),

    /// The remote service refused the change as conflicting.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The remote call failed.
    #[error(transparent)]
    Transport(TransportError),
}

impl RepoError {
    /// Taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::Unauthenticated => ErrorKind::Unauthenticated,
            RepoError::Forbidden { .. } => ErrorKind::Forbidden,
            RepoError::IssueNotFound(_) | RepoError::RelationshipNotFound(_) => ErrorKind::NotFound,
            RepoError::Conflict(_) => ErrorKind::DuplicateEdge,
            RepoError::Transport(e) => e.kind(),
        }
    }

    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::Transport(e) if e.is_transient())
    }
}

impl From<TransportError> for RepoError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unauthenticated => RepoError::Unauthenticated,
            other => RepoError::Transport(other),
        }
    }
}

/// Per-target failure reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// The reference could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A repository call failed.
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl OperationError {
    /// Taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Resolution(e) => e.kind(),
            OperationError::Repo(e) => e.kind(),
        }
    }

    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, OperationError::Repo(e) if e.is_transient())
    }

    /// Whether this failure means every further remote call will fail too.
    pub fn is_unauthenticated(&self) -> bool {
        self.kind() == ErrorKind::Unauthenticated
    }
}

impl From<TransportError> for OperationError {
    fn from(e: TransportError) -> Self {
        OperationError::Repo(e.into())
    }
}

/// The error type for setting up a deplink run.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials could not be obtained.
    #[error("Credential error: {0}")]
    Credentials(String),

    /// An operation failed as a whole.
    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// A specialized Result type for deplink setup.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::rate_limited(TransportError::RateLimited { attempts: 5 }, true)]
    #[case::unavailable(TransportError::ServiceUnavailable { attempts: 5, detail: "502".into() }, true)]
    #[case::timeout(TransportError::Timeout { seconds: 30 }, true)]
    #[case::not_found(TransportError::NotFound, false)]
    #[case::forbidden(TransportError::Forbidden { message: "nope".into() }, false)]
    fn test_transport_transience(#[case] error: TransportError, #[case] transient: bool) {
        assert_eq!(error.is_transient(), transient);
        assert_eq!(RepoError::from(error).is_transient(), transient);
    }

    #[test]
    fn test_unauthenticated_is_lifted_out_of_transport() {
        let error = OperationError::from(TransportError::Unauthenticated);
        assert_eq!(error, OperationError::Repo(RepoError::Unauthenticated));
        assert!(error.is_unauthenticated());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            ResolutionError::malformed("x", "bad").kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            RepoError::Transport(TransportError::Decode("eof".into())).kind(),
            ErrorKind::UnexpectedRemote
        );
        assert_eq!(
            RepoError::IssueNotFound(IssueRef::new("a", "b", 1)).kind(),
            ErrorKind::NotFound
        );
    }
}
