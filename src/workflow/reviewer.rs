//! Reviews the pull requests the fix loop opens and posts a verdict the
//! feedback flow can act on.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::iteration;
use crate::llm::prompt::{self, ReviewContext};
use crate::platform::types::{PullRequest, RepoContext, ReviewEvent};
use crate::review::{parse_review, Verdict};

use super::{Orchestrator, ReviewOutcome};

static LINKED_ISSUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:close[sd]?|fix(?:e[sd])?|resolve[sd]?|ref(?:erence)?|#)\s*#?(\d+)")
        .expect("linked issue pattern is valid")
});

static ISSUE_BRANCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^issue-\d+$").expect("issue branch pattern is valid"));

/// Issue a pull request body links to (`Closes #3`, `fixes 3`, `#3`, ...).
pub fn linked_issue(body: &str) -> Option<u64> {
    LINKED_ISSUE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Cut `text` to at most `max` characters, marking the cut with `note`.
pub fn truncate_chars(text: &str, max: usize, note: &str) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\n\n# NOTE: {note}\n", &text[..idx]),
        None => text.to_string(),
    }
}

impl Orchestrator {
    /// Ask the model to review a pull request and submit its answer.
    ///
    /// Only pull requests on `issue-<n>` branches that are still in the loop
    /// are reviewed.
    pub async fn review_pull_request(
        &self,
        repo: &RepoContext,
        pr_number: u64,
    ) -> Result<ReviewOutcome> {
        let pr = self.platform.get_pull_request(repo, pr_number).await?;
        if !ISSUE_BRANCH_RE.is_match(&pr.head_branch) {
            tracing::debug!(pr = pr_number, head = %pr.head_branch, "Not an issue branch; skipping review");
            return Ok(ReviewOutcome::Skipped {
                reason: "not an issue branch",
            });
        }

        let labels = self.platform.get_labels(repo, pr_number).await?;
        if let Some(status) = iteration::read_status(&labels).filter(|s| s.is_terminal()) {
            tracing::info!(pr = pr_number, %status, "Pull request already finished; skipping review");
            return Ok(ReviewOutcome::Skipped {
                reason: "loop already finished",
            });
        }

        let issue_text = self.linked_issue_text(repo, &pr).await;
        let diff = self
            .platform
            .get_pull_request_diff(repo, pr_number)
            .await?;
        let (ci_result, ci_output) = self.ci_context(repo, &pr).await;

        let limits = self.review_limits;
        let diff = truncate_chars(&diff, limits.max_diff_chars, "diff truncated due to size.");
        let ci_output = truncate_chars(&ci_output, limits.max_ci_chars, "CI output truncated.");

        tracing::info!(
            repo = %repo.full_name,
            pr = pr_number,
            ci = %ci_result,
            diff_chars = diff.len(),
            "Reviewing pull request"
        );

        let user_prompt = prompt::review_prompt(&ReviewContext {
            pr_title: &pr.title,
            pr_body: &pr.body,
            issue_text: &issue_text,
            ci_result: &ci_result,
            ci_output: &ci_output,
            diff: &diff,
        });
        let answer = self
            .model
            .complete(prompt::SYSTEM_REVIEWER, &user_prompt)
            .await?;
        let body = answer.trim();
        if body.is_empty() {
            return Err(AppError::Llm("Reviewer returned an empty answer".to_string()));
        }

        let review = parse_review(body);
        if !review.is_parseable() {
            tracing::warn!(pr = pr_number, "Reviewer answer has no VERDICT line; treating it as FAIL");
        }
        let verdict = review.outcome();

        let event = match verdict {
            Verdict::Pass => ReviewEvent::Approve,
            Verdict::Fail => ReviewEvent::RequestChanges,
        };
        let event = self.submit_review(repo, pr_number, body, event).await?;

        tracing::info!(pr = pr_number, %verdict, %event, "Review submitted");
        Ok(ReviewOutcome::Submitted { verdict, event })
    }

    /// Submit with `event`, falling back to a plain comment review when the
    /// platform refuses it. Returns the event that was accepted.
    async fn submit_review(
        &self,
        repo: &RepoContext,
        pr_number: u64,
        body: &str,
        event: ReviewEvent,
    ) -> Result<ReviewEvent> {
        match self.platform.submit_review(repo, pr_number, body, event).await {
            Ok(()) => Ok(event),
            Err(e) => {
                tracing::warn!(pr = pr_number, %event, error = %e, "Review event refused; posting as comment");
                self.platform
                    .submit_review(repo, pr_number, body, ReviewEvent::Comment)
                    .await?;
                Ok(ReviewEvent::Comment)
            }
        }
    }

    async fn linked_issue_text(&self, repo: &RepoContext, pr: &PullRequest) -> String {
        let Some(number) = linked_issue(&pr.body) else {
            return String::new();
        };

        match self.platform.get_issue(repo, number).await {
            Ok(issue) => prompt::issue_section(number, &issue.title, &issue.body),
            Err(e) => {
                tracing::warn!(pr = pr.number, issue = number, error = %e, "Could not fetch linked issue");
                format!("# Issue\nUnable to fetch issue #{number}\n")
            }
        }
    }

    /// CI state and per-check lines for the head commit; `unknown` when the
    /// status cannot be read.
    async fn ci_context(&self, repo: &RepoContext, pr: &PullRequest) -> (String, String) {
        match self.platform.get_commit_status(repo, &pr.head_sha).await {
            Ok(status) => (status.state, status.details.join("\n")),
            Err(e) => {
                tracing::warn!(pr = pr.number, error = %e, "Could not read CI status");
                ("unknown".to_string(), String::new())
            }
        }
    }
}
