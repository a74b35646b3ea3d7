use crate::error::{best_effort, Result};
use crate::iteration::{self, IterationStatus};
use crate::llm::prompt;
use crate::platform::types::{CreatePullRequest, PullRequest, RepoContext};

use super::{IssueOutcome, Orchestrator};

/// Deterministic working branch for an issue.
pub fn issue_branch(issue_number: u64) -> String {
    format!("issue-{issue_number}")
}

impl Orchestrator {
    /// Turn an issue into a pull request.
    ///
    /// Re-delivery of the same issue reuses the open pull request for the
    /// issue branch instead of opening another one.
    pub async fn solve_issue(&self, repo: &RepoContext, issue_number: u64) -> Result<IssueOutcome> {
        let issue = self.platform.get_issue(repo, issue_number).await?;
        let branch = issue_branch(issue_number);

        tracing::info!(
            repo = %repo.full_name,
            issue = issue_number,
            branch = %branch,
            "Solving issue"
        );

        let handle = self
            .prepare_workspace(repo, &format!("issue{issue_number}"))
            .await?;
        self.workspace.checkout_new_branch(&handle, &branch).await?;

        let user_prompt = prompt::solve_issue_prompt(&issue.title, &issue.body);
        self.generate_and_apply(&handle, prompt::SYSTEM_CODE_AGENT, &user_prompt)
            .await?;

        let changed = self
            .workspace
            .commit_all(&handle, &format!("Implement issue #{issue_number}"))
            .await?;

        if !changed {
            tracing::info!(repo = %repo.full_name, issue = issue_number, "Model produced no changes");
            self.comment_best_effort(
                repo,
                issue_number,
                "I did not find any changes to make for this issue, so no pull request was opened.",
            )
            .await;
            return Ok(IssueOutcome::NoChanges);
        }

        self.refresh_origin(repo, &handle).await?;
        self.workspace.push(&handle, &branch).await?;

        let (pr, reused) = self
            .find_or_create_pull_request(repo, issue_number, &issue.title, &branch)
            .await?;

        tracing::info!(
            repo = %repo.full_name,
            issue = issue_number,
            pr = pr.number,
            reused,
            "Pull request ready"
        );

        best_effort(
            "initialize iteration tags",
            self.init_tags(repo, pr.number).await,
        );

        Ok(IssueOutcome::PullRequestOpened {
            number: pr.number,
            url: pr.html_url,
            reused,
        })
    }

    async fn find_or_create_pull_request(
        &self,
        repo: &RepoContext,
        issue_number: u64,
        issue_title: &str,
        branch: &str,
    ) -> Result<(PullRequest, bool)> {
        if let Some(existing) = self.platform.find_open_pull_request(repo, branch).await? {
            return Ok((existing, true));
        }

        let request = CreatePullRequest {
            title: format!("Implement issue #{issue_number}: {issue_title}"),
            body: format!(
                "Closes #{issue_number}\n\nOpened automatically. Review it with a `VERDICT: PASS` or `VERDICT: FAIL` line; failed reviews are fixed on this branch."
            ),
            head_branch: branch.to_string(),
            base_branch: self.base_branch.clone(),
        };

        let created = self.platform.create_pull_request(repo, &request).await?;
        Ok((created, false))
    }

    /// Start the loop at iteration 0 unless the pull request already carries
    /// loop progress. A reused pull request keeps its counter and status.
    async fn init_tags(&self, repo: &RepoContext, pr_number: u64) -> Result<()> {
        let current = self.platform.get_labels(repo, pr_number).await?;

        let iteration = iteration::read_iteration(&current);
        let status = iteration::read_status(&current);
        if iteration.is_some() || status.is_some() {
            tracing::info!(
                pr = pr_number,
                ?iteration,
                ?status,
                "Pull request already tracked; keeping its iteration tags"
            );
            return Ok(());
        }

        self.write_tags(repo, pr_number, &current, 0, IterationStatus::Running)
            .await
    }
}
