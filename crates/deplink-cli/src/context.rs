//! Run context discovered from the environment.
//!
//! - Ambient repository: `--repo`, then `GH_REPO`, then the `origin` remote
//!   of the current git checkout
//! - Token: `GH_TOKEN`, then `GITHUB_TOKEN`, then `gh auth token`
//!
//! Environment access goes through a lookup closure so the precedence rules
//! can be tested without touching the process environment.

use anyhow::{Context, Result, bail};
use deplink::domain::RepoIdentity;
use std::process::Command;

/// Parse `GH_REPO`, which may carry a host prefix (`[HOST/]OWNER/REPO`).
fn parse_gh_repo(value: &str) -> Option<RepoIdentity> {
    let segments: Vec<&str> = value.trim().trim_end_matches('/').split('/').collect();
    match segments.as_slice() {
        [owner, repo] | [_, owner, repo] => RepoIdentity::parse(&format!("{owner}/{repo}")).ok(),
        _ => None,
    }
}

/// Output of a helper command, if it ran and succeeded.
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        tracing::debug!(program, ?args, status = %output.status, "Helper command failed");
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Repository that bare issue numbers resolve against.
///
/// `remote` is consulted last and only when nothing else matched; it returns
/// the URL of the `origin` remote.
pub fn ambient_repo(
    explicit: Option<RepoIdentity>,
    env: impl Fn(&str) -> Option<String>,
    remote: impl FnOnce() -> Option<String>,
) -> Option<RepoIdentity> {
    if let Some(repo) = explicit {
        return Some(repo);
    }
    if let Some(value) = env("GH_REPO").filter(|v| !v.trim().is_empty()) {
        match parse_gh_repo(&value) {
            Some(repo) => return Some(repo),
            None => tracing::warn!(value = %value, "Ignoring unparseable GH_REPO"),
        }
    }
    let url = remote()?;
    let repo = RepoIdentity::from_remote_url(&url);
    if repo.is_none() {
        tracing::debug!(url = %url, "origin remote is not a recognizable repository URL");
    }
    repo
}

/// URL of the current checkout's `origin` remote.
pub fn origin_remote_url() -> Option<String> {
    command_output("git", &["remote", "get-url", "origin"])
}

/// Find an API token.
///
/// `helper` is consulted last and returns the output of `gh auth token`.
///
/// # Errors
///
/// Fails when no source yields a non-empty token.
pub fn discover_token(
    env: impl Fn(&str) -> Option<String>,
    helper: impl FnOnce() -> Option<String>,
) -> Result<String> {
    for name in ["GH_TOKEN", "GITHUB_TOKEN"] {
        if let Some(token) = env(name).filter(|t| !t.trim().is_empty()) {
            tracing::debug!(source = name, "Using token from environment");
            return Ok(token);
        }
    }
    if let Some(token) = helper() {
        tracing::debug!(source = "gh auth token", "Using token from gh");
        return Ok(token);
    }
    bail!("No GitHub token found: set GH_TOKEN or GITHUB_TOKEN, or run `gh auth login`")
}

/// Token from the `gh` CLI's credential store.
pub fn gh_auth_token() -> Option<String> {
    command_output("gh", &["auth", "token"])
}

/// Read the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load configuration for this run.
///
/// # Errors
///
/// Fails when the file is unreadable or invalid, or an override is invalid.
pub async fn load_config(path: &std::path::Path) -> Result<deplink::config::DeplinkConfig> {
    deplink::config::DeplinkConfig::resolve(path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[rstest]
    #[case::plain("acme/widgets", Some("acme/widgets"))]
    #[case::with_host("github.example.com/acme/widgets", Some("acme/widgets"))]
    #[case::too_short("widgets", None)]
    #[case::too_long("a/b/c/d", None)]
    fn test_parse_gh_repo(#[case] value: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_gh_repo(value).map(|r| r.full_name()).as_deref(), expected);
    }

    #[test]
    fn test_ambient_repo_precedence() {
        let explicit = RepoIdentity::new("flag", "repo");
        let from_flag = ambient_repo(Some(explicit.clone()), env(&[("GH_REPO", "env/repo")]), || {
            panic!("remote must not be consulted")
        });
        assert_eq!(from_flag, Some(explicit));

        let from_env = ambient_repo(None, env(&[("GH_REPO", "env/repo")]), || {
            panic!("remote must not be consulted")
        });
        assert_eq!(from_env, Some(RepoIdentity::new("env", "repo")));

        let from_remote = ambient_repo(None, env(&[]), || {
            Some("git@github.com:Remote/Repo.git".to_string())
        });
        assert_eq!(from_remote, Some(RepoIdentity::new("remote", "repo")));

        assert_eq!(ambient_repo(None, env(&[]), || None), None);
    }

    #[test]
    fn test_token_precedence() {
        let token = discover_token(env(&[("GH_TOKEN", "a"), ("GITHUB_TOKEN", "b")]), || {
            Some("c".to_string())
        })
        .unwrap();
        assert_eq!(token, "a");

        let token = discover_token(env(&[("GITHUB_TOKEN", "b")]), || Some("c".to_string())).unwrap();
        assert_eq!(token, "b");

        let token = discover_token(env(&[("GH_TOKEN", " ")]), || Some("c".to_string())).unwrap();
        assert_eq!(token, "c");

        let err = discover_token(env(&[]), || None).unwrap_err();
        assert!(err.to_string().contains("GH_TOKEN"));
    }
}
