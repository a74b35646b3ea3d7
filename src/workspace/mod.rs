pub mod git;
pub mod manager;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::patch::UnifiedDiff;

pub use manager::WorkspaceManager;

/// A local working copy bound to one `(repository, logical key)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub path: PathBuf,
}

/// Version-control operations the workflow performs on a working copy.
#[async_trait]
pub trait WorkspaceOps: Send + Sync {
    /// Directory for the working copy of `(repo_full_name, logical_key)`.
    fn workspace_path(&self, repo_full_name: &str, logical_key: &str) -> PathBuf;

    /// Open the working copy at `path`, cloning `remote_url` if it is missing.
    async fn ensure_cloned(&self, path: &Path, remote_url: &str) -> Result<RepoHandle>;

    /// Start `branch` fresh from the latest configured base branch.
    async fn checkout_new_branch(&self, repo: &RepoHandle, branch: &str) -> Result<()>;

    /// Check out an existing remote branch, up to date with origin.
    async fn checkout_existing_branch(&self, repo: &RepoHandle, branch: &str) -> Result<()>;

    /// Apply a model-produced diff to the working tree.
    async fn apply_patch(&self, repo: &RepoHandle, diff: &UnifiedDiff) -> Result<()>;

    /// Stage everything and commit; `false` when there was nothing to commit.
    async fn commit_all(&self, repo: &RepoHandle, message: &str) -> Result<bool>;

    /// Rewrite origin so that pushes authenticate with `token`.
    async fn set_origin_with_token(
        &self,
        repo: &RepoHandle,
        remote_url: &str,
        token: &str,
    ) -> Result<()>;

    /// Force-with-lease push of `branch` to origin.
    async fn push(&self, repo: &RepoHandle, branch: &str) -> Result<()>;
}
