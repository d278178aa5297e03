//! Issue reference resolution.
//!
//! Normalizes the ways a user can name an issue into a canonical
//! [`IssueRef`]:
//!
//! - `123` or `#123` (needs an ambient repository)
//! - `owner/repo#123`
//! - `https://github.com/owner/repo/issues/123` (any host, optional trailing
//!   slash, query string or fragment)
//!
//! Resolution never touches the network and is the first validation gate of
//! every operation.

use crate::domain::{IssueRef, RepoIdentity};
use crate::error::ResolutionError;

/// Resolve a raw reference, falling back to `ambient` for bare numbers.
///
/// # Errors
///
/// - `ResolutionError::Malformed` if the input matches no accepted form
/// - `ResolutionError::MissingRepoContext` for a bare number without `ambient`
pub fn resolve(raw: &str, ambient: Option<&RepoIdentity>) -> Result<IssueRef, ResolutionError> {
    let input = raw.trim();

    if input.is_empty() {
        return Err(ResolutionError::malformed(raw, "reference is empty"));
    }

    if input.contains("://") {
        return resolve_url(raw, input);
    }

    let bare = input.strip_prefix('#').unwrap_or(input);
    if bare.chars().all(|c| c.is_ascii_digit()) {
        let number = parse_number(raw, bare)?;
        return ambient
            .map(|repo| repo.issue(number))
            .ok_or_else(|| ResolutionError::MissingRepoContext {
                input: raw.to_string(),
            });
    }

    let (repo_part, number_part) = input.split_once('#').ok_or_else(|| {
        ResolutionError::malformed(raw, "expected a number, owner/repo#number or an issue URL")
    })?;
    let repo =
        RepoIdentity::parse(repo_part).map_err(|reason| ResolutionError::malformed(raw, reason))?;
    let number = parse_number(raw, number_part)?;
    Ok(repo.issue(number))
}

fn resolve_url(raw: &str, input: &str) -> Result<IssueRef, ResolutionError> {
    let (scheme, rest) = input
        .split_once("://")
        .ok_or_else(|| ResolutionError::malformed(raw, "not a URL"))?;
    if scheme != "https" && scheme != "http" {
        return Err(ResolutionError::malformed(
            raw,
            format!("unsupported URL scheme '{scheme}'"),
        ));
    }

    // Drop query string and fragment before splitting the path
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [_host, owner, repo, "issues", number] => {
            let repo = RepoIdentity::parse(&format!("{owner}/{repo}"))
                .map_err(|reason| ResolutionError::malformed(raw, reason))?;
            Ok(repo.issue(parse_number(raw, number)?))
        }
        _ => Err(ResolutionError::malformed(
            raw,
            "expected a URL of the form https://host/owner/repo/issues/number",
        )),
    }
}

fn parse_number(raw: &str, s: &str) -> Result<u64, ResolutionError> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(ResolutionError::malformed(
            raw,
            format!("'{s}' is not an issue number"),
        ));
    }
    match s.parse::<u64>() {
        Ok(0) => Err(ResolutionError::malformed(raw, "issue numbers start at 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(ResolutionError::malformed(raw, "issue number is too large")),
    }
}

/// Owner and repository names: alphanumerics, `-`, `_` and `.`.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl RepoIdentity {
    /// Parse `owner/repo`.
    ///
    /// Returns a description of the problem on failure, suitable for clap's
    /// `value_parser`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let (owner, repo) = s
            .split_once('/')
            .ok_or_else(|| format!("'{s}' is not of the form owner/repo"))?;

        if !is_valid_name(owner) {
            return Err(format!("invalid repository owner '{owner}'"));
        }
        if !is_valid_name(repo) {
            return Err(format!("invalid repository name '{repo}'"));
        }

        Ok(Self::new(owner, repo))
    }

    /// Derive the repository from a git remote URL.
    ///
    /// Accepts `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo.git`
    /// and the scp-like `git@host:owner/repo.git`. Returns `None` for anything
    /// else.
    pub fn from_remote_url(url: &str) -> Option<Self> {
        let url = url.trim();
        let path = if let Some((_, rest)) = url.split_once("://") {
            rest.split_once('/')?.1
        } else {
            // scp-like syntax: user@host:owner/repo.git
            let (host, path) = url.split_once(':')?;
            if host.contains('/') {
                return None;
            }
            path
        };

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let repo = segments.next()?;
        if segments.next().is_some() {
            return None;
        }
        Self::parse(&format!("{owner}/{repo}")).ok()
    }

    /// Derive the repository from an API `repository_url`
    /// (`https://api.host/repos/owner/repo`).
    pub fn from_api_url(url: &str) -> Option<Self> {
        let (_, rest) = url.split_once("/repos/")?;
        let mut segments = rest.trim_end_matches('/').split('/');
        let owner = segments.next()?;
        let repo = segments.next()?;
        Self::parse(&format!("{owner}/{repo}")).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ambient() -> RepoIdentity {
        RepoIdentity::new("acme", "widgets")
    }

    #[rstest]
    #[case::bare("42", "acme/widgets#42")]
    #[case::hash("#42", "acme/widgets#42")]
    #[case::padded("  42 ", "acme/widgets#42")]
    #[case::qualified("octo/tools#7", "octo/tools#7")]
    #[case::qualified_mixed_case("Octo/Tools#7", "octo/tools#7")]
    #[case::url("https://github.com/octo/tools/issues/7", "octo/tools#7")]
    #[case::url_trailing_slash("https://github.com/octo/tools/issues/7/", "octo/tools#7")]
    #[case::url_fragment("https://github.com/octo/tools/issues/7#issuecomment-1", "octo/tools#7")]
    #[case::url_query("https://github.com/octo/tools/issues/7?foo=bar", "octo/tools#7")]
    #[case::enterprise_url("https://git.example.com/octo/tools/issues/7", "octo/tools#7")]
    fn test_resolve_valid(#[case] raw: &str, #[case] expected: &str) {
        let resolved = resolve(raw, Some(&ambient())).unwrap();
        assert_eq!(resolved.key(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::zero("0")]
    #[case::negative("-3")]
    #[case::word("abc")]
    #[case::missing_number("octo/tools#")]
    #[case::missing_repo("octo#7")]
    #[case::extra_segment("a/b/c#7")]
    #[case::pull_url("https://github.com/octo/tools/pull/7")]
    #[case::ftp_url("ftp://github.com/octo/tools/issues/7")]
    #[case::overflow("99999999999999999999999")]
    fn test_resolve_malformed(#[case] raw: &str) {
        let err = resolve(raw, Some(&ambient())).unwrap_err();
        assert!(
            matches!(err, ResolutionError::Malformed { .. }),
            "expected Malformed for {raw:?}, got {err:?}"
        );
    }

    #[test]
    fn test_bare_number_needs_ambient_repo() {
        assert_eq!(
            resolve("42", None),
            Err(ResolutionError::MissingRepoContext {
                input: "42".to_string()
            })
        );
        // Fully qualified forms do not
        assert!(resolve("octo/tools#7", None).is_ok());
    }

    #[test]
    fn test_all_forms_normalize_to_same_key() {
        let forms = [
            "7",
            "#7",
            "acme/widgets#7",
            "ACME/widgets#7",
            "https://github.com/acme/widgets/issues/7",
        ];
        let keys: Vec<String> = forms
            .iter()
            .map(|f| resolve(f, Some(&ambient())).unwrap().key())
            .collect();
        assert!(keys.iter().all(|k| k == "acme/widgets#7"), "{keys:?}");
    }

    #[rstest]
    #[case::https("https://github.com/acme/widgets.git", Some("acme/widgets"))]
    #[case::https_no_suffix("https://github.com/acme/widgets", Some("acme/widgets"))]
    #[case::scp("git@github.com:acme/widgets.git", Some("acme/widgets"))]
    #[case::ssh("ssh://git@github.com/acme/widgets.git", Some("acme/widgets"))]
    #[case::nested("https://gitlab.com/group/sub/widgets.git", None)]
    #[case::local_path("/srv/git/widgets", None)]
    fn test_from_remote_url(#[case] url: &str, #[case] expected: Option<&str>) {
        let repo = RepoIdentity::from_remote_url(url).map(|r| r.full_name());
        assert_eq!(repo.as_deref(), expected);
    }

    #[test]
    fn test_from_api_url() {
        assert_eq!(
            RepoIdentity::from_api_url("https://api.github.com/repos/Octo/Tools"),
            Some(RepoIdentity::new("octo", "tools"))
        );
        assert_eq!(RepoIdentity::from_api_url("https://api.github.com/users/octo"), None);
    }

    #[rstest]
    #[case::no_slash("widgets")]
    #[case::empty_owner("/widgets")]
    #[case::space("acme/wid gets")]
    #[case::dot_dot("../widgets")]
    fn test_repo_identity_parse_invalid(#[case] s: &str) {
        assert!(RepoIdentity::parse(s).is_err());
    }
}
