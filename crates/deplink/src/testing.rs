//! In-memory fake of the remote issue-dependencies API.
//!
//! [`FakeTracker`] implements [`HttpBackend`] by routing requests to an
//! in-memory model of issues, canonical relationships and repository
//! permissions, so the real transport and repository code run unchanged in
//! tests. Failures can be injected per path or for the next N requests.
//!
//! Only available with `#[cfg(test)]` or the `test-util` feature.

use crate::auth::CredentialProvider;
use crate::config::DeplinkConfig;
use crate::domain::{IssueRef, RelationshipKind, RepoIdentity};
use crate::error::Result;
use crate::transport::{
    ApiRequest, ApiResponse, BackendError, BackoffPolicy, HttpBackend, Method, RateLimiter,
    Transport, TransportSettings,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default page size when the request names none.
const DEFAULT_PER_PAGE: usize = 30;

#[derive(Debug, Clone)]
struct FakeIssue {
    reference: IssueRef,
    id: u64,
    title: String,
    closed: bool,
}

impl FakeIssue {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "number": self.reference.number,
            "title": self.title,
            "state": if self.closed { "closed" } else { "open" },
            "repository_url": format!(
                "https://api.github.test/repos/{}/{}",
                self.reference.owner, self.reference.repo
            ),
        })
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    issues: BTreeMap<IssueRef, FakeIssue>,
    /// Canonical `(dependent, prerequisite)` pairs
    edges: BTreeSet<(IssueRef, IssueRef)>,
    read_only: HashSet<RepoIdentity>,
    revoked: bool,
    revoke_after: Option<usize>,
    next_id: u64,
    fail_next: VecDeque<u16>,
    fail_matching: Vec<(String, u16)>,
    hang_matching: Vec<String>,
    calls: Vec<String>,
    mutations: usize,
}

/// In-memory stand-in for the GitHub issue-dependencies API.
#[derive(Debug, Default)]
pub struct FakeTracker {
    state: Mutex<TrackerState>,
}

impl FakeTracker {
    /// Create an empty tracker. Every repository is writable until
    /// [`FakeTracker::deny_write`] says otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Seeding ==========

    /// Add an open issue.
    pub fn add_issue(&self, reference: &IssueRef, title: &str) {
        let mut state = self.state();
        state.next_id += 1;
        let id = 9000 + state.next_id;
        state.issues.insert(
            reference.clone(),
            FakeIssue {
                reference: reference.clone(),
                id,
                title: title.to_string(),
                closed: false,
            },
        );
    }

    /// Add several open issues to one repository.
    pub fn add_issues(&self, repo: &RepoIdentity, numbers: impl IntoIterator<Item = u64>) {
        for number in numbers {
            self.add_issue(&repo.issue(number), &format!("Issue {number}"));
        }
    }

    /// Mark an issue closed.
    pub fn close_issue(&self, reference: &IssueRef) {
        if let Some(issue) = self.state().issues.get_mut(reference) {
            issue.closed = true;
        }
    }

    /// Seed "`dependent` blocked by `prerequisite`" without counting it as a
    /// mutation.
    pub fn link(&self, dependent: &IssueRef, prerequisite: &IssueRef) {
        self.state()
            .edges
            .insert((dependent.clone(), prerequisite.clone()));
    }

    /// Remove write permission on a repository.
    pub fn deny_write(&self, repo: &RepoIdentity) {
        self.state().read_only.insert(repo.clone());
    }

    /// Answer every further request with 401.
    pub fn revoke_credentials(&self) {
        self.state().revoked = true;
    }

    /// Start answering 401 once `mutations` changes have succeeded.
    pub fn revoke_after(&self, mutations: usize) {
        self.state().revoke_after = Some(mutations);
    }

    /// Answer the next `count` requests with `status`.
    pub fn fail_next(&self, status: u16, count: usize) {
        let mut state = self.state();
        state.fail_next.extend(std::iter::repeat_n(status, count));
    }

    /// Answer every request whose path contains `fragment` with `status`.
    pub fn fail_matching(&self, fragment: &str, status: u16) {
        self.state()
            .fail_matching
            .push((fragment.to_string(), status));
    }

    /// Never answer requests whose path contains `fragment`.
    pub fn hang_matching(&self, fragment: &str) {
        self.state().hang_matching.push(fragment.to_string());
    }

    // ========== Inspection ==========

    /// Whether "`dependent` blocked by `prerequisite`" exists.
    pub fn has_edge(&self, dependent: &IssueRef, prerequisite: &IssueRef) -> bool {
        self.state()
            .edges
            .contains(&(dependent.clone(), prerequisite.clone()))
    }

    /// Number of canonical relationships.
    pub fn edge_count(&self) -> usize {
        self.state().edges.len()
    }

    /// Successful create and delete calls so far.
    pub fn mutation_count(&self) -> usize {
        self.state().mutations
    }

    /// Every request received, as `METHOD path`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    // ========== Wiring ==========

    /// A transport over this tracker with short, deterministic backoff.
    pub fn transport(tracker: &Arc<Self>) -> Transport {
        let limiter = Arc::new(RateLimiter::new(BackoffPolicy {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(10),
            jitter: false,
        }));
        Transport::new(
            tracker.clone(),
            limiter,
            TransportSettings {
                timeout: Duration::from_secs(10),
                max_attempts: 3,
            },
        )
    }

    // ========== Routing ==========

    /// Records a request that will never be answered.
    fn hangs(&self, request: &ApiRequest) -> bool {
        let mut state = self.state();
        let hang = state
            .hang_matching
            .iter()
            .any(|fragment| request.path.contains(fragment.as_str()));
        if hang {
            state
                .calls
                .push(format!("{} {}", request.method, request.path));
        }
        hang
    }

    fn route(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.state();
        state
            .calls
            .push(format!("{} {}", request.method, request.path));

        if let Some(limit) = state.revoke_after {
            if state.mutations >= limit {
                state.revoked = true;
            }
        }
        if state.revoked {
            return error(401, "Bad credentials");
        }
        if let Some(status) = state.fail_next.pop_front() {
            return error(status, "injected failure");
        }
        if let Some(&(_, status)) = state
            .fail_matching
            .iter()
            .find(|(fragment, _)| request.path.contains(fragment.as_str()))
        {
            return error(status, "injected failure");
        }

        let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();
        match (request.method, segments.as_slice()) {
            (Method::Get, ["repos", owner, repo]) => {
                let repo = RepoIdentity::new(owner, repo);
                let push = !state.read_only.contains(&repo);
                ApiResponse::json(
                    200,
                    &json!({
                        "full_name": repo.full_name(),
                        "permissions": {"admin": false, "maintain": false, "push": push, "triage": push, "pull": true},
                    }),
                )
            }
            (Method::Get, ["repos", owner, repo, "issues", number]) => {
                match lookup(&state, owner, repo, number) {
                    Some(issue) => ApiResponse::json(200, &issue.to_json()),
                    None => error(404, "Not Found"),
                }
            }
            (Method::Get, ["repos", owner, repo, "issues", number, "dependencies", kind]) => {
                let Some(subject) = lookup(&state, owner, repo, number).map(|i| i.reference.clone())
                else {
                    return error(404, "Not Found");
                };
                let Some(kind) = parse_kind(kind) else {
                    return error(404, "Not Found");
                };
                list(&state, &subject, kind, request)
            }
            (Method::Post, ["repos", owner, repo, "issues", number, "dependencies", kind]) => {
                let Some(subject) = lookup(&state, owner, repo, number).map(|i| i.reference.clone())
                else {
                    return error(404, "Not Found");
                };
                let Some(kind) = parse_kind(kind) else {
                    return error(404, "Not Found");
                };
                create(&mut state, subject, kind, request.body.as_ref())
            }
            (
                Method::Delete,
                ["repos", owner, repo, "issues", number, "dependencies", kind, remote_id],
            ) => {
                let Some(subject) = lookup(&state, owner, repo, number).map(|i| i.reference.clone())
                else {
                    return error(404, "Not Found");
                };
                let Some(kind) = parse_kind(kind) else {
                    return error(404, "Not Found");
                };
                delete(&mut state, subject, kind, remote_id)
            }
            _ => error(404, "Not Found"),
        }
    }
}

fn error(status: u16, message: &str) -> ApiResponse {
    ApiResponse::json(status, &json!({ "message": message }))
}

fn lookup<'a>(
    state: &'a TrackerState,
    owner: &str,
    repo: &str,
    number: &str,
) -> Option<&'a FakeIssue> {
    let number = number.parse().ok()?;
    state.issues.get(&IssueRef::new(owner, repo, number))
}

fn parse_kind(kind: &str) -> Option<RelationshipKind> {
    match kind {
        "blocked_by" => Some(RelationshipKind::BlockedBy),
        "blocks" => Some(RelationshipKind::Blocks),
        _ => None,
    }
}

/// Canonical pair for `subject <kind> related`.
fn canonical(subject: IssueRef, related: IssueRef, kind: RelationshipKind) -> (IssueRef, IssueRef) {
    match kind {
        RelationshipKind::BlockedBy => (subject, related),
        RelationshipKind::Blocks => (related, subject),
    }
}

fn list(
    state: &TrackerState,
    subject: &IssueRef,
    kind: RelationshipKind,
    request: &ApiRequest,
) -> ApiResponse {
    let per_page = request
        .query_param("per_page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PER_PAGE);
    let page: usize = request
        .query_param("page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);

    let related: Vec<Value> = state
        .edges
        .iter()
        .filter_map(|(dependent, prerequisite)| match kind {
            RelationshipKind::BlockedBy if dependent == subject => Some(prerequisite),
            RelationshipKind::Blocks if prerequisite == subject => Some(dependent),
            _ => None,
        })
        .filter_map(|reference| state.issues.get(reference))
        .skip(page.saturating_sub(1) * per_page)
        .take(per_page)
        .map(FakeIssue::to_json)
        .collect();

    ApiResponse::json(200, &Value::Array(related))
}

fn create(
    state: &mut TrackerState,
    subject: IssueRef,
    kind: RelationshipKind,
    body: Option<&Value>,
) -> ApiResponse {
    let Some(target) = body.and_then(|b| b.get("issue")) else {
        return error(422, "Missing issue");
    };
    let related = match (
        target.get("owner").and_then(Value::as_str),
        target.get("repo").and_then(Value::as_str),
        target.get("number").and_then(Value::as_u64),
    ) {
        (Some(owner), Some(repo), Some(number)) => IssueRef::new(owner, repo, number),
        _ => return error(422, "Invalid issue"),
    };

    if state.read_only.contains(&subject.repository()) {
        return error(403, "Resource not accessible by integration");
    }
    let Some(related_issue) = state.issues.get(&related).cloned() else {
        return error(404, "Not Found");
    };

    let pair = canonical(subject, related, kind);
    if !state.edges.insert(pair) {
        return error(422, "Dependency already exists");
    }
    state.mutations += 1;
    ApiResponse::json(201, &related_issue.to_json())
}

fn delete(
    state: &mut TrackerState,
    subject: IssueRef,
    kind: RelationshipKind,
    remote_id: &str,
) -> ApiResponse {
    if state.read_only.contains(&subject.repository()) {
        return error(403, "Resource not accessible by integration");
    }
    let Some(related) = state
        .issues
        .values()
        .find(|issue| issue.id.to_string() == remote_id)
        .map(|issue| issue.reference.clone())
    else {
        return error(404, "Not Found");
    };

    let pair = canonical(subject, related, kind);
    if !state.edges.remove(&pair) {
        return error(404, "Not Found");
    }
    state.mutations += 1;
    ApiResponse::empty(204)
}

#[async_trait]
impl HttpBackend for FakeTracker {
    async fn execute(
        &self,
        request: &ApiRequest,
    ) -> std::result::Result<ApiResponse, BackendError> {
        if self.hangs(request) {
            std::future::pending::<()>().await;
        }
        Ok(self.route(request))
    }
}

/// [`CredentialProvider`] that hands out a shared [`FakeTracker`].
#[derive(Debug, Clone)]
pub struct FakeCredentials(pub Arc<FakeTracker>);

impl CredentialProvider for FakeCredentials {
    fn backend(&self, _config: &DeplinkConfig) -> Result<Arc<dyn HttpBackend>> {
        let backend: Arc<dyn HttpBackend> = self.0.clone();
        Ok(backend)
    }
}
