use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{Repository, Signature};

use crate::config::WorkspaceConfig;
use crate::error::{AppError, Result};
use crate::patch::{self, UnifiedDiff};
use crate::workspace::{git, RepoHandle, WorkspaceOps};

/// Manages per-unit working copies under the configured base directory.
///
/// Working copies are kept between iterations of the same logical unit;
/// every branch switch discards local state.
pub struct WorkspaceManager {
    base_dir: PathBuf,
    base_branch: String,
    author_name: String,
    author_email: String,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            base_branch: config.base_branch.clone(),
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
        }
    }

    /// Run a blocking git2 step on the working copy at `path`.
    async fn with_repo<T, F>(path: &Path, step: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Repository) -> Result<T> + Send + 'static,
    {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&path)?;
            f(&repo)
        })
        .await
        .map_err(|e| AppError::Workspace(format!("{step} task panicked: {e}")))?
        .map_err(|e| AppError::Workspace(format!("{step} failed: {e}")))
    }
}

#[async_trait]
impl WorkspaceOps for WorkspaceManager {
    fn workspace_path(&self, repo_full_name: &str, logical_key: &str) -> PathBuf {
        let safe = format!("{}_{logical_key}", repo_full_name.replace('/', "_"));
        self.base_dir.join(safe.replace(['/', '\\'], "_"))
    }

    async fn ensure_cloned(&self, path: &Path, remote_url: &str) -> Result<RepoHandle> {
        let dir = path.to_path_buf();
        let url = remote_url.to_string();

        tokio::task::spawn_blocking(move || git::open_or_clone(&dir, &url).map(|_| ()))
            .await
            .map_err(|e| AppError::Workspace(format!("Clone task panicked: {e}")))?
            .map_err(|e| {
                AppError::Workspace(format!(
                    "Failed to clone/open repo: {}",
                    git::redact_credentials(&e.to_string())
                ))
            })?;

        tracing::debug!(path = %path.display(), "Workspace ready");
        Ok(RepoHandle {
            path: path.to_path_buf(),
        })
    }

    async fn checkout_new_branch(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        git::validate_branch_name(branch)?;
        let base = self.base_branch.clone();
        let branch = branch.to_string();

        Self::with_repo(&repo.path, "Checkout new branch", move |r| {
            git::fetch_all(r)?;
            git::checkout_branch(r, &base)?;
            git::fast_forward(r, &base)?;
            git::force_branch(r, &branch)
        })
        .await
    }

    async fn checkout_existing_branch(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        git::validate_branch_name(branch)?;
        let branch = branch.to_string();

        Self::with_repo(&repo.path, "Checkout branch", move |r| {
            git::fetch_all(r)?;
            git::checkout_branch(r, &branch)?;
            git::fast_forward(r, &branch)
        })
        .await
    }

    async fn apply_patch(&self, repo: &RepoHandle, diff: &UnifiedDiff) -> Result<()> {
        patch::apply_patch(&repo.path, diff).await?;
        Ok(())
    }

    async fn commit_all(&self, repo: &RepoHandle, message: &str) -> Result<bool> {
        let message = message.to_string();
        let name = self.author_name.clone();
        let email = self.author_email.clone();

        Self::with_repo(&repo.path, "Commit", move |r| {
            let sig = Signature::now(&name, &email)?;
            git::commit_all(r, &message, &sig)
        })
        .await
    }

    async fn set_origin_with_token(
        &self,
        repo: &RepoHandle,
        remote_url: &str,
        token: &str,
    ) -> Result<()> {
        let authed = git::url_with_token(remote_url, token);
        Self::with_repo(&repo.path, "Set origin", move |r| {
            git::set_origin_url(r, &authed)
        })
        .await
    }

    async fn push(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        git::push_with_lease(&repo.path, branch)
            .await
            .map_err(|e| AppError::Workspace(e.to_string()))
    }
}
