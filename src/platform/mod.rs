pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Code-hosting operations the workflow depends on.
///
/// Every method is a single blocking-style request with no retries.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Get an installation-scoped access token.
    async fn get_access_token(&self, installation_id: u64) -> Result<String>;

    /// Fetch an issue.
    async fn get_issue(&self, repo: &RepoContext, issue_number: u64) -> Result<Issue>;

    /// Fetch a pull request.
    async fn get_pull_request(&self, repo: &RepoContext, pr_number: u64) -> Result<PullRequest>;

    /// The open pull request whose head is `head_branch` in this repository.
    async fn find_open_pull_request(
        &self,
        repo: &RepoContext,
        head_branch: &str,
    ) -> Result<Option<PullRequest>>;

    /// Create a pull request.
    async fn create_pull_request(
        &self,
        repo: &RepoContext,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest>;

    /// Post a comment on an issue or PR.
    async fn post_comment(&self, repo: &RepoContext, issue_number: u64, body: &str) -> Result<()>;

    /// Current label names on an issue or PR.
    async fn get_labels(&self, repo: &RepoContext, issue_number: u64) -> Result<Vec<String>>;

    /// Replace the whole label set on an issue or PR.
    async fn replace_labels(
        &self,
        repo: &RepoContext,
        issue_number: u64,
        labels: &[String],
    ) -> Result<()>;

    /// Unified diff of a pull request against its base.
    async fn get_pull_request_diff(&self, repo: &RepoContext, pr_number: u64) -> Result<String>;

    /// Combined status of the checks reported for a commit.
    async fn get_commit_status(&self, repo: &RepoContext, sha: &str) -> Result<CommitStatus>;

    /// Submit a review on a pull request.
    async fn submit_review(
        &self,
        repo: &RepoContext,
        pr_number: u64,
        body: &str,
        event: ReviewEvent,
    ) -> Result<()>;
}
