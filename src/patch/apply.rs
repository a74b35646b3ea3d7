use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::UnifiedDiff;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Model did not return a diff/patch that can be applied")]
    NotAPatch,

    #[error("git apply failed.\n\nstderr(3way): {three_way}\n\nstderr: {direct}")]
    ApplyFailed { three_way: String, direct: String },

    #[error("Failed to run git apply: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result of a single `git apply` invocation.
struct ApplyAttempt {
    success: bool,
    stderr: String,
}

/// Apply `diff` to the working tree at `working_tree`.
///
/// Tries a three-way apply first, then a plain apply of the same bytes.
/// When both fail the error carries both diagnostics verbatim.
pub async fn apply_patch(working_tree: &Path, diff: &UnifiedDiff) -> Result<(), PatchError> {
    if !diff.looks_like_patch() {
        return Err(PatchError::NotAPatch);
    }

    let three_way = run_git_apply(working_tree, diff, true).await?;
    if three_way.success {
        tracing::debug!(hunks = diff.hunk_count(), "Patch applied with --3way");
        return Ok(());
    }

    tracing::info!(
        stderr = %three_way.stderr,
        "Three-way apply failed, retrying without --3way"
    );

    let direct = run_git_apply(working_tree, diff, false).await?;
    if direct.success {
        tracing::debug!(hunks = diff.hunk_count(), "Patch applied without --3way");
        return Ok(());
    }

    Err(PatchError::ApplyFailed {
        three_way: three_way.stderr,
        direct: direct.stderr,
    })
}

async fn run_git_apply(
    working_tree: &Path,
    diff: &UnifiedDiff,
    three_way: bool,
) -> Result<ApplyAttempt, PatchError> {
    let mut cmd = Command::new("git");
    cmd.arg("apply").arg("--whitespace=nowarn");
    if three_way {
        cmd.arg("--3way");
    }
    cmd.arg("-")
        .current_dir(working_tree)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(PatchError::Spawn)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(diff.as_str().as_bytes())
            .await
            .map_err(PatchError::Spawn)?;
        // Dropping stdin closes the pipe so git sees EOF.
    }

    let output = child.wait_with_output().await.map_err(PatchError::Spawn)?;

    Ok(ApplyAttempt {
        success: output.status.success(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
