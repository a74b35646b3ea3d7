use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::platform::types::RepoContext;
use crate::queue::Task;

/// The subset of a GitHub webhook payload the service reads.
///
/// Every field is optional so that a missing one can be reported as a
/// bad request instead of a parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub action: Option<String>,
    pub installation: Option<InstallationPayload>,
    pub repository: Option<RepositoryPayload>,
    pub issue: Option<NumberedPayload>,
    pub pull_request: Option<PullRequestPayload>,
    pub review: Option<ReviewPayload>,
    pub repositories_added: Option<serde_json::Value>,
    pub repositories_removed: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct InstallationPayload {
    pub id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryPayload {
    pub full_name: Option<String>,
    pub clone_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NumberedPayload {
    pub number: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestPayload {
    pub number: Option<u64>,
    pub head: Option<PullRequestRef>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub ref_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPayload {
    pub body: Option<String>,
}

/// What to do with a verified delivery.
#[derive(Debug)]
pub enum Routing {
    Dispatch(Task),
    Ignore,
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Lower-cased `action`, empty when absent.
    pub fn action(&self) -> String {
        self.action.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Event type from the `X-GitHub-Event` header, falling back to the
    /// payload shape when the header is missing or blank.
    pub fn infer_event(&self, header: Option<&str>) -> Option<String> {
        if let Some(event) = header.map(str::trim).filter(|e| !e.is_empty()) {
            return Some(event.to_string());
        }

        if self.repositories_added.is_some() || self.repositories_removed.is_some() {
            Some("installation_repositories".to_string())
        } else if self.issue.is_some() {
            Some("issues".to_string())
        } else if self.pull_request.is_some() && self.review.is_some() {
            Some("pull_request_review".to_string())
        } else {
            None
        }
    }

    /// Decide whether `(event, action)` starts a unit of work.
    ///
    /// Pull request events start a review only when `review_pull_requests`
    /// is set.
    pub fn route(&self, event: &str, action: &str, review_pull_requests: bool) -> Result<Routing> {
        match (event, action) {
            ("issues", "opened") => {
                let repo = self.repo_context()?;
                let issue_number = self
                    .issue
                    .as_ref()
                    .and_then(|i| i.number)
                    .filter(|n| *n != 0)
                    .ok_or_else(|| missing("issue.number"))?;

                Ok(Routing::Dispatch(Task::SolveIssue { repo, issue_number }))
            }
            ("pull_request_review", "submitted") => {
                let repo = self.repo_context()?;
                let (pr_number, head_branch) = self.pull_request_ref()?;

                let review_body = self
                    .review
                    .as_ref()
                    .and_then(|r| r.body.as_deref())
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                Ok(Routing::Dispatch(Task::ReviewFeedback {
                    repo,
                    pr_number,
                    head_branch,
                    review_body,
                }))
            }
            ("pull_request", "opened" | "reopened" | "synchronize") if review_pull_requests => {
                let repo = self.repo_context()?;
                let (pr_number, head_branch) = self.pull_request_ref()?;

                Ok(Routing::Dispatch(Task::ReviewPullRequest {
                    repo,
                    pr_number,
                    head_branch,
                }))
            }
            _ => Ok(Routing::Ignore),
        }
    }

    fn pull_request_ref(&self) -> Result<(u64, Option<String>)> {
        let pr = self.pull_request.as_ref();
        let number = pr
            .and_then(|p| p.number)
            .filter(|n| *n != 0)
            .ok_or_else(|| missing("pull_request.number"))?;
        let head = pr
            .and_then(|p| p.head.as_ref())
            .and_then(|h| h.ref_name.clone())
            .filter(|r| !r.is_empty());

        Ok((number, head))
    }

    fn repo_context(&self) -> Result<RepoContext> {
        let installation_id = self
            .installation
            .as_ref()
            .and_then(|i| i.id)
            .filter(|id| *id != 0)
            .ok_or_else(|| missing("installation.id"))?;

        let repository = self.repository.as_ref();
        let full_name = repository
            .and_then(|r| r.full_name.as_deref())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| missing("repository.full_name"))?;
        let clone_url = repository.and_then(|r| r.clone_url.as_deref());

        Ok(RepoContext::new(installation_id, full_name, clone_url))
    }
}

fn missing(field: &str) -> AppError {
    AppError::InvalidInput(format!("Missing {field} in payload"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> WebhookPayload {
        WebhookPayload::parse(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_infer_event_prefers_header() {
        let p = payload(r#"{"issue": {"number": 1}}"#);
        assert_eq!(p.infer_event(Some("ping")).as_deref(), Some("ping"));
        assert_eq!(p.infer_event(Some("  ")).as_deref(), Some("issues"));
        assert_eq!(p.infer_event(None).as_deref(), Some("issues"));
    }

    #[test]
    fn test_infer_event_from_shape() {
        assert_eq!(
            payload(r#"{"repositories_added": []}"#).infer_event(None).as_deref(),
            Some("installation_repositories")
        );
        assert_eq!(
            payload(r#"{"pull_request": {"number": 2}, "review": {"body": "x"}}"#)
                .infer_event(None)
                .as_deref(),
            Some("pull_request_review")
        );
        assert_eq!(payload(r#"{"pull_request": {"number": 2}}"#).infer_event(None), None);
    }

    #[test]
    fn test_route_issue_opened() {
        let p = payload(
            r#"{
                "action": "Opened",
                "installation": {"id": 9},
                "repository": {"full_name": "octo/widgets"},
                "issue": {"number": 4}
            }"#,
        );

        let Routing::Dispatch(Task::SolveIssue { repo, issue_number }) =
            p.route("issues", &p.action(), false).unwrap()
        else {
            panic!("expected a solve task");
        };
        assert_eq!(issue_number, 4);
        assert_eq!(repo.installation_id, 9);
        assert_eq!(repo.clone_url, "https://github.com/octo/widgets.git");
    }

    #[test]
    fn test_route_review_submitted_trims_body() {
        let p = payload(
            r#"{
                "action": "submitted",
                "installation": {"id": 9},
                "repository": {"full_name": "octo/widgets", "clone_url": "https://example.com/w.git"},
                "pull_request": {"number": 12, "head": {"ref": "issue-4"}},
                "review": {"body": "\n  VERDICT: FAIL \n"}
            }"#,
        );

        let Routing::Dispatch(Task::ReviewFeedback {
            repo,
            pr_number,
            head_branch,
            review_body,
        }) = p.route("pull_request_review", "submitted", false).unwrap()
        else {
            panic!("expected a review task");
        };
        assert_eq!(pr_number, 12);
        assert_eq!(head_branch.as_deref(), Some("issue-4"));
        assert_eq!(review_body, "VERDICT: FAIL");
        assert_eq!(repo.clone_url, "https://example.com/w.git");
    }

    #[test]
    fn test_route_rejects_missing_fields() {
        let no_installation = payload(r#"{"repository": {"full_name": "o/r"}, "issue": {"number": 1}}"#);
        assert!(no_installation.route("issues", "opened", false).is_err());

        let no_repo = payload(r#"{"installation": {"id": 1}, "issue": {"number": 1}}"#);
        assert!(no_repo.route("issues", "opened", false).is_err());

        let no_number = payload(r#"{"installation": {"id": 1}, "repository": {"full_name": "o/r"}, "issue": {}}"#);
        assert!(no_number.route("issues", "opened", false).is_err());

        let no_pr = payload(r#"{"installation": {"id": 1}, "repository": {"full_name": "o/r"}, "review": {}}"#);
        assert!(no_pr.route("pull_request_review", "submitted", false).is_err());
    }

    #[test]
    fn test_route_ignores_other_events() {
        let p = payload(r#"{"installation": {"id": 1}}"#);
        assert!(matches!(p.route("issues", "closed", true).unwrap(), Routing::Ignore));
        assert!(matches!(
            p.route("installation_repositories", "added", true).unwrap(),
            Routing::Ignore
        ));
        assert!(matches!(p.route("ping", "", true).unwrap(), Routing::Ignore));
    }

    #[test]
    fn test_route_pull_request_only_when_reviewing() {
        let p = payload(
            r#"{
                "action": "synchronize",
                "installation": {"id": 9},
                "repository": {"full_name": "octo/widgets"},
                "pull_request": {"number": 12, "head": {"ref": "issue-4"}}
            }"#,
        );

        assert!(matches!(
            p.route("pull_request", "synchronize", false).unwrap(),
            Routing::Ignore
        ));

        let Routing::Dispatch(task) = p.route("pull_request", "synchronize", true).unwrap() else {
            panic!("expected a review task");
        };
        assert!(matches!(
            task,
            Task::ReviewPullRequest { pr_number: 12, .. }
        ));
        assert_eq!(task.key(), "octo/widgets#branch-issue-4");

        assert!(matches!(
            p.route("pull_request", "closed", true).unwrap(),
            Routing::Ignore
        ));
    }
}
