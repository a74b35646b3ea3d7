//! The two entry flows of the fix loop.
//!
//! Nothing here keeps progress in memory: every unit of work re-derives the
//! iteration state from the labels on the remote pull request, so a crashed
//! unit can be replayed by re-delivering its event.

pub mod issue;
pub mod review;
pub mod reviewer;
pub mod types;

#[cfg(test)]
pub(crate) mod fakes;

use std::sync::Arc;

use crate::error::{best_effort, Result};
use crate::iteration::{self, IterationStatus};
use crate::llm::CompletionModel;
use crate::patch::{extract_diff, UnifiedDiff};
use crate::platform::types::RepoContext;
use crate::platform::Platform;
use crate::workspace::{RepoHandle, WorkspaceOps};

pub use types::{FeedbackAction, FeedbackOutcome, IssueOutcome, ReviewOutcome};

pub struct Orchestrator {
    platform: Arc<dyn Platform>,
    model: Arc<dyn CompletionModel>,
    workspace: Arc<dyn WorkspaceOps>,
    base_branch: String,
    max_iters: u32,
    review_limits: ReviewLimits,
}

/// Size caps for the context handed to the reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewLimits {
    pub max_diff_chars: usize,
    pub max_ci_chars: usize,
}

impl Default for ReviewLimits {
    fn default() -> Self {
        Self {
            max_diff_chars: 120_000,
            max_ci_chars: 60_000,
        }
    }
}

impl Orchestrator {
    pub fn new(
        platform: Arc<dyn Platform>,
        model: Arc<dyn CompletionModel>,
        workspace: Arc<dyn WorkspaceOps>,
        base_branch: &str,
        max_iters: u32,
    ) -> Self {
        Self {
            platform,
            model,
            workspace,
            base_branch: base_branch.to_string(),
            max_iters,
            review_limits: ReviewLimits::default(),
        }
    }

    pub fn with_review_limits(mut self, limits: ReviewLimits) -> Self {
        self.review_limits = limits;
        self
    }

    pub fn max_iters(&self) -> u32 {
        self.max_iters
    }

    /// Clone or reopen the working copy for `key` and point origin at a
    /// token-bearing URL.
    async fn prepare_workspace(&self, repo: &RepoContext, key: &str) -> Result<RepoHandle> {
        let path = self.workspace.workspace_path(&repo.full_name, key);
        let handle = self.workspace.ensure_cloned(&path, &repo.clone_url).await?;
        self.refresh_origin(repo, &handle).await?;
        Ok(handle)
    }

    /// Installation tokens are short-lived; fetch one right before talking
    /// to the remote.
    async fn refresh_origin(&self, repo: &RepoContext, handle: &RepoHandle) -> Result<()> {
        let token = self.platform.get_access_token(repo.installation_id).await?;
        self.workspace
            .set_origin_with_token(handle, &repo.clone_url, &token)
            .await
    }

    /// Ask the model for a change and apply it. Returns the extracted diff.
    async fn generate_and_apply(
        &self,
        handle: &RepoHandle,
        system: &str,
        prompt: &str,
    ) -> Result<UnifiedDiff> {
        let answer = self.model.complete(system, prompt).await?;
        let diff = extract_diff(&answer);

        if diff.is_blank() {
            tracing::warn!("Model answer contains no diff; treating it as no change");
            return Ok(diff);
        }

        tracing::info!(
            hunks = diff.hunk_count(),
            files = ?diff.touched_paths(),
            "Applying model patch"
        );
        self.workspace.apply_patch(handle, &diff).await?;
        Ok(diff)
    }

    /// Rewrite the iteration labels on `number`, keeping unrelated labels.
    async fn write_tags(
        &self,
        repo: &RepoContext,
        number: u64,
        current: &[String],
        iteration: u32,
        status: IterationStatus,
    ) -> Result<()> {
        let labels = iteration::write_iteration(current, Some(iteration), status);
        self.platform.replace_labels(repo, number, &labels).await
    }

    async fn comment_best_effort(&self, repo: &RepoContext, number: u64, body: &str) {
        best_effort(
            "post comment",
            self.platform.post_comment(repo, number, body).await,
        );
    }
}
