use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{best_effort, AppError, Result};
use crate::iteration::{self, IterationStatus};
use crate::llm::prompt;
use crate::platform::types::{PullRequest, RepoContext};
use crate::review::{parse_review, Verdict};

use super::{FeedbackAction, FeedbackOutcome, Orchestrator};

static ISSUE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(\d+)").expect("issue reference pattern is valid"));

const UNKNOWN_ISSUE: &str = "(unknown issue)";

/// First `#<n>` reference in a pull request body.
pub fn referenced_issue(body: &str) -> Option<u64> {
    ISSUE_REF_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl Orchestrator {
    /// Run one iteration of the fix loop for a submitted review.
    ///
    /// State is loaded from the pull request labels on every call. PASS and
    /// an exhausted budget both end the loop before the model is contacted.
    pub async fn on_reviewer_feedback(
        &self,
        repo: &RepoContext,
        pr_number: u64,
        review_body: &str,
    ) -> Result<FeedbackOutcome> {
        let review = parse_review(review_body);
        if !review.is_parseable() {
            tracing::warn!(
                repo = %repo.full_name,
                pr = pr_number,
                "Review has no VERDICT line; treating it as FAIL"
            );
        }
        let verdict = review.outcome();

        // Without the labels neither the budget nor a terminal status can be
        // checked, so the unit fails here.
        let labels = self.platform.get_labels(repo, pr_number).await?;
        let iteration = iteration::read_iteration(&labels).unwrap_or(0);

        tracing::info!(
            repo = %repo.full_name,
            pr = pr_number,
            %verdict,
            iteration,
            max_iters = self.max_iters,
            "Processing review feedback"
        );

        let finished = |action| FeedbackOutcome {
            verdict,
            action,
            iteration,
            branch: None,
        };

        if let Some(status) = iteration::read_status(&labels).filter(|s| s.is_terminal()) {
            tracing::info!(pr = pr_number, %status, "Pull request already finished; ignoring review");
            return Ok(finished(FeedbackAction::AlreadyFinished));
        }

        if verdict == Verdict::Pass {
            best_effort(
                "mark done",
                self.write_tags(repo, pr_number, &labels, iteration, IterationStatus::Done)
                    .await,
            );
            return Ok(finished(FeedbackAction::Done));
        }

        if iteration >= self.max_iters {
            best_effort(
                "mark stopped",
                self.write_tags(repo, pr_number, &labels, iteration, IterationStatus::Stopped)
                    .await,
            );
            let body = format!(
                "Stopping after {iteration} fix iterations (limit {}). Last reviewer feedback:\n\n{}",
                self.max_iters,
                review_body.trim()
            );
            self.comment_best_effort(repo, pr_number, &body).await;
            return Ok(finished(FeedbackAction::StoppedMaxIterations));
        }

        let pr = self.platform.get_pull_request(repo, pr_number).await?;
        if pr.head_branch.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Pull request #{pr_number} has no head branch"
            )));
        }
        let (issue_title, issue_body) = self.originating_issue(repo, &pr).await?;

        let handle = self
            .prepare_workspace(repo, &format!("pr{pr_number}"))
            .await?;
        self.workspace
            .checkout_existing_branch(&handle, &pr.head_branch)
            .await?;

        let user_prompt =
            prompt::fix_from_feedback_prompt(&issue_title, &issue_body, review_body);
        self.generate_and_apply(&handle, prompt::SYSTEM_CODE_AGENT, &user_prompt)
            .await?;

        let next = iteration + 1;
        let changed = self
            .workspace
            .commit_all(
                &handle,
                &format!("Fix iteration {next} for PR #{pr_number} (review feedback)"),
            )
            .await?;

        if !changed {
            tracing::info!(pr = pr_number, "Fix produced no changes; stopping");
            best_effort(
                "mark stopped",
                self.write_tags(repo, pr_number, &labels, iteration, IterationStatus::Stopped)
                    .await,
            );
            self.comment_best_effort(
                repo,
                pr_number,
                "The requested fix produced no file changes, so the fix loop is stopping here.",
            )
            .await;
            return Ok(FeedbackOutcome {
                verdict,
                action: FeedbackAction::StoppedNoChanges,
                iteration,
                branch: Some(pr.head_branch),
            });
        }

        self.refresh_origin(repo, &handle).await?;
        self.workspace.push(&handle, &pr.head_branch).await?;

        // Labels may have been edited while the model was working.
        best_effort("advance iteration", self.advance_tags(repo, pr_number, next).await);

        tracing::info!(pr = pr_number, iteration = next, branch = %pr.head_branch, "Fix pushed");

        Ok(FeedbackOutcome {
            verdict,
            action: FeedbackAction::Advanced,
            iteration: next,
            branch: Some(pr.head_branch),
        })
    }

    /// Re-read the labels and move them to `next`/RUNNING. A failed re-read
    /// skips the write instead of replacing the labels with a guessed set.
    async fn advance_tags(&self, repo: &RepoContext, pr_number: u64, next: u32) -> Result<()> {
        let current = self.platform.get_labels(repo, pr_number).await?;
        self.write_tags(repo, pr_number, &current, next, IterationStatus::Running)
            .await
    }

    /// Title and body of the issue a pull request was opened for.
    async fn originating_issue(
        &self,
        repo: &RepoContext,
        pr: &PullRequest,
    ) -> Result<(String, String)> {
        match referenced_issue(&pr.body) {
            Some(number) => {
                let issue = self.platform.get_issue(repo, number).await?;
                Ok((issue.title, issue.body))
            }
            None => {
                tracing::warn!(pr = pr.number, "No issue reference in pull request body");
                Ok((UNKNOWN_ISSUE.to_string(), String::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::super::fakes::*;
    use super::*;

    const FAIL_REVIEW: &str = "Tests are missing.\nVERDICT: FAIL\nNEXT_ACTIONS:\n- add a test";

    fn harness(answer: &str, labels: &[&str]) -> Harness {
        let h = Harness::new(answer);
        h.platform.with(|s| {
            s.issues.insert(3, issue(3, "Add greeting", "Please add hello.txt"));
            s.pull_requests.push(pull_request(12, "issue-3", "Closes #3"));
            s.labels
                .insert(12, labels.iter().map(|l| l.to_string()).collect());
        });
        h
    }

    #[test]
    fn test_referenced_issue() {
        assert_eq!(referenced_issue("Closes #3\n\nsee also #9"), Some(3));
        assert_eq!(referenced_issue("no reference"), None);
        assert_eq!(referenced_issue("#"), None);
    }

    #[tokio::test]
    async fn test_fail_from_scratch_advances() {
        let h = harness(VALID_ANSWER, &[]);
        let outcome = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();

        assert_eq!(outcome.action, FeedbackAction::Advanced);
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.iteration, 1);
        assert_eq!(outcome.branch.as_deref(), Some("issue-3"));
        assert_eq!(h.workspace.pushes(), vec!["issue-3".to_string()]);
        assert_eq!(
            h.workspace.commits(),
            vec!["Fix iteration 1 for PR #12 (review feedback)".to_string()]
        );
        assert_eq!(
            h.platform.labels(12),
            vec!["agent:iter-1".to_string(), "agent:running".to_string()]
        );

        let prompt = h.model.last_prompt().unwrap();
        assert!(prompt.contains("Add greeting"));
        assert!(prompt.contains("add a test"));

        let log = h.workspace.log.lock().unwrap();
        assert_eq!(log.existing_branches, vec!["issue-3".to_string()]);
        assert!(log.new_branches.is_empty());
    }

    #[tokio::test]
    async fn test_fail_without_changes_stops() {
        let h = harness(VALID_ANSWER, &[]);
        h.workspace.dirty.store(false, Ordering::SeqCst);

        let outcome = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();

        assert_eq!(outcome.action, FeedbackAction::StoppedNoChanges);
        assert_eq!(outcome.iteration, 0);
        assert!(h.workspace.pushes().is_empty());
        assert_eq!(
            h.platform.labels(12),
            vec!["agent:iter-0".to_string(), "agent:stopped".to_string()]
        );
        assert_eq!(h.platform.comments().len(), 1);
    }

    #[tokio::test]
    async fn test_pass_marks_done_without_model_call() {
        let h = harness(VALID_ANSWER, &["agent:iter-4", "agent:running", "bug"]);
        let outcome = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, "Looks good.\nverdict: pass")
            .await
            .unwrap();

        assert_eq!(outcome.action, FeedbackAction::Done);
        assert_eq!(outcome.iteration, 4);
        assert_eq!(h.model.calls(), 0);
        assert_eq!(
            h.platform.labels(12),
            vec![
                "agent:done".to_string(),
                "agent:iter-4".to_string(),
                "bug".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_budget_exhausted_stops_without_model_call() {
        let h = harness(VALID_ANSWER, &["agent:iter-5", "agent:running"]);
        let outcome = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();

        assert_eq!(outcome.action, FeedbackAction::StoppedMaxIterations);
        assert_eq!(h.model.calls(), 0);
        assert!(h.workspace.pushes().is_empty());
        assert_eq!(
            h.platform.labels(12),
            vec!["agent:iter-5".to_string(), "agent:stopped".to_string()]
        );

        let comments = h.platform.comments();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].1.contains("Tests are missing."));
    }

    #[tokio::test]
    async fn test_comment_failure_does_not_mask_outcome() {
        let h = harness(VALID_ANSWER, &["agent:iter-5", "agent:running"]);
        h.platform.with(|s| s.fail_comments = true);

        let outcome = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();

        assert_eq!(outcome.action, FeedbackAction::StoppedMaxIterations);
        assert!(h.platform.comments().is_empty());
    }

    #[tokio::test]
    async fn test_missing_verdict_counts_as_fail() {
        let h = harness(VALID_ANSWER, &["agent:iter-2", "agent:running"]);
        let outcome = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, "please rename the file")
            .await
            .unwrap();

        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.action, FeedbackAction::Advanced);
        assert_eq!(outcome.iteration, 3);
    }

    #[tokio::test]
    async fn test_terminal_labels_are_honored() {
        let h = harness(VALID_ANSWER, &["agent:iter-2", "agent:done"]);
        let outcome = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();

        assert_eq!(outcome.action, FeedbackAction::AlreadyFinished);
        assert_eq!(h.model.calls(), 0);
        assert_eq!(h.platform.label_writes(), 0);
    }

    #[tokio::test]
    async fn test_unknown_issue_reference() {
        let h = harness(VALID_ANSWER, &[]);
        h.platform.with(|s| {
            s.pull_requests[0].body = "No reference here".to_string();
        });

        h.orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();

        assert!(h.model.last_prompt().unwrap().contains(UNKNOWN_ISSUE));
    }

    #[tokio::test]
    async fn test_label_read_failure_fails_without_model_call() {
        let h = harness(VALID_ANSWER, &["agent:iter-5", "needs-triage"]);
        h.platform.with(|s| s.fail_label_reads = true);

        let result = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await;

        assert!(matches!(result, Err(AppError::GitHubApi(_))));
        assert_eq!(h.model.calls(), 0);
        assert!(h.workspace.pushes().is_empty());
        assert_eq!(h.platform.label_writes(), 0);
        assert_eq!(
            h.platform.labels(12),
            vec!["agent:iter-5".to_string(), "needs-triage".to_string()]
        );
    }

    #[tokio::test]
    async fn test_label_reread_failure_skips_advance() {
        let h = harness(VALID_ANSWER, &["agent:iter-2", "agent:running", "needs-triage"]);
        h.platform.with(|s| s.fail_label_reads_after = Some(1));

        let outcome = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();

        assert_eq!(outcome.action, FeedbackAction::Advanced);
        assert_eq!(outcome.iteration, 3);
        assert_eq!(h.workspace.pushes(), vec!["issue-3".to_string()]);
        assert_eq!(h.platform.label_writes(), 0);
        assert_eq!(
            h.platform.labels(12),
            vec![
                "agent:iter-2".to_string(),
                "agent:running".to_string(),
                "needs-triage".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_push_failure_keeps_iteration() {
        let h = harness(VALID_ANSWER, &["agent:iter-1", "agent:running"]);
        h.workspace.fail_push.store(true, Ordering::SeqCst);

        let result = h
            .orchestrator()
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await;

        assert!(result.is_err());
        assert_eq!(
            h.platform.labels(12),
            vec!["agent:iter-1".to_string(), "agent:running".to_string()]
        );
    }

    #[tokio::test]
    async fn test_replayed_review_recomputes_from_labels() {
        let h = harness(VALID_ANSWER, &[]);
        let orchestrator = h.orchestrator();

        let first = orchestrator
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();
        let second = orchestrator
            .on_reviewer_feedback(&repo(), 12, FAIL_REVIEW)
            .await
            .unwrap();

        assert_eq!(first.iteration, 1);
        assert_eq!(second.iteration, 2);
    }
}
