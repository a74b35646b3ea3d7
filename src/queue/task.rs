use crate::platform::types::RepoContext;
use crate::workflow::issue::issue_branch;

/// A background unit of work created from an accepted webhook event.
#[derive(Debug, Clone)]
pub enum Task {
    SolveIssue {
        repo: RepoContext,
        issue_number: u64,
    },
    ReviewFeedback {
        repo: RepoContext,
        pr_number: u64,
        /// Head ref reported by the event, when present.
        head_branch: Option<String>,
        review_body: String,
    },
    ReviewPullRequest {
        repo: RepoContext,
        pr_number: u64,
        head_branch: Option<String>,
    },
}

impl Task {
    pub fn repo(&self) -> &RepoContext {
        match self {
            Task::SolveIssue { repo, .. }
            | Task::ReviewFeedback { repo, .. }
            | Task::ReviewPullRequest { repo, .. } => repo,
        }
    }

    /// Logical unit this task mutates; tasks sharing a key never overlap.
    ///
    /// Every task touching a pull request keys on its head branch, so a solve
    /// unit for issue `n` and a review unit for the `issue-n` pull request
    /// share one key.
    pub fn key(&self) -> String {
        let repo = &self.repo().full_name;
        match self {
            Task::SolveIssue { issue_number, .. } => {
                format!("{repo}#branch-{}", issue_branch(*issue_number))
            }
            Task::ReviewFeedback {
                pr_number,
                head_branch,
                ..
            }
            | Task::ReviewPullRequest {
                pr_number,
                head_branch,
                ..
            } => match head_branch.as_deref().filter(|b| !b.is_empty()) {
                Some(branch) => format!("{repo}#branch-{branch}"),
                None => format!("{repo}#pr-{pr_number}"),
            },
        }
    }

    pub fn description(&self) -> String {
        match self {
            Task::SolveIssue {
                repo, issue_number, ..
            } => format!("Solve issue #{issue_number} on {}", repo.full_name),
            Task::ReviewFeedback { repo, pr_number, .. } => {
                format!("Apply review feedback on PR #{pr_number} on {}", repo.full_name)
            }
            Task::ReviewPullRequest { repo, pr_number, .. } => {
                format!("Review PR #{pr_number} on {}", repo.full_name)
            }
        }
    }
}
