//! Credential seam.
//!
//! The core never reads, stores or logs a credential itself. A
//! [`CredentialProvider`] turns configuration into an authenticated
//! [`HttpBackend`]; the binary decides where the token comes from.

use crate::config::DeplinkConfig;
use crate::error::{Error, Result};
use crate::transport::{HttpBackend, ReqwestBackend};
use std::fmt;
use std::sync::Arc;

/// Produces an authenticated backend for a run.
pub trait CredentialProvider: Send + Sync {
    /// Build the backend for `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Credentials` when no usable credential is available,
    /// or `Error::Config` when the backend cannot be built.
    fn backend(&self, config: &DeplinkConfig) -> Result<Arc<dyn HttpBackend>>;
}

/// A bearer token obtained by the caller.
#[derive(Clone)]
pub struct TokenCredentials {
    token: String,
}

impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TokenCredentials {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }
}

impl CredentialProvider for TokenCredentials {
    fn backend(&self, config: &DeplinkConfig) -> Result<Arc<dyn HttpBackend>> {
        if self.token.is_empty() {
            return Err(Error::Credentials(
                "empty token: run `gh auth login` or set GH_TOKEN".to_string(),
            ));
        }
        let backend = ReqwestBackend::new(&config.api_url, &self.token, config.request_timeout())?;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_rejected() {
        let err = TokenCredentials::new("  \n")
            .backend(&DeplinkConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn test_token_is_redacted() {
        let credentials = TokenCredentials::new("ghp_abc123");
        assert!(!format!("{credentials:?}").contains("ghp_abc123"));
        assert!(credentials.backend(&DeplinkConfig::default()).is_ok());
    }
}
