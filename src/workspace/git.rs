use std::path::Path;
use std::process::Stdio;

use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    BranchType, Cred, FetchOptions, IndexAddOption, RemoteCallbacks, Repository, Signature,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::error::{AppError, Result};

static URL_CREDENTIALS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://)[^/@\s]+@").expect("credential pattern is valid"));

/// Mask the userinfo part of every URL in `text`.
pub fn redact_credentials(text: &str) -> String {
    URL_CREDENTIALS_RE.replace_all(text, "${1}***@").into_owned()
}

/// Embed an installation token in an HTTPS remote URL. Other URLs are
/// returned unchanged.
pub fn url_with_token(remote_url: &str, token: &str) -> String {
    match remote_url.strip_prefix("https://") {
        Some(rest) => format!(
            "https://x-access-token:{}@{rest}",
            urlencoding::encode(token)
        ),
        None => remote_url.to_string(),
    }
}

/// `(user, password)` embedded in an HTTPS URL, if any.
fn url_credentials(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("https://")?;
    let (userinfo, _) = rest.split_once('@')?;
    if userinfo.contains('/') {
        return None;
    }
    let (user, password) = userinfo.split_once(':')?;
    let password = urlencoding::decode(password).ok()?.into_owned();
    Some((user.to_string(), password))
}

/// Validate a branch name to prevent argument injection.
/// Rejects names starting with `-` as defence in depth.
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('-') {
        return Err(AppError::Git(format!("Invalid branch name: {name:?}")));
    }
    Ok(())
}

/// Build `FetchOptions` that answer credential prompts with the userinfo
/// embedded in `url`.
fn make_fetch_options(url: &str) -> FetchOptions<'static> {
    let mut opts = FetchOptions::new();
    if let Some((user, password)) = url_credentials(url) {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
            Cred::userpass_plaintext(&user, &password)
        });
        opts.remote_callbacks(callbacks);
    }
    opts
}

fn force_checkout() -> CheckoutBuilder<'static> {
    let mut builder = CheckoutBuilder::new();
    builder.force().remove_untracked(true);
    builder
}

/// Open the repository at `dir`, cloning `url` into it first when there is
/// no working tree yet.
pub fn open_or_clone(dir: &Path, url: &str) -> Result<Repository> {
    if dir.join(".git").exists() {
        return Ok(Repository::open(dir)?);
    }

    std::fs::create_dir_all(dir)?;
    let repo = RepoBuilder::new()
        .fetch_options(make_fetch_options(url))
        .clone(url, dir)?;
    Ok(repo)
}

/// Fetch every configured remote with its default refspecs.
pub fn fetch_all(repo: &Repository) -> Result<()> {
    let remotes = repo.remotes()?;
    for name in remotes.iter().flatten() {
        let mut remote = repo.find_remote(name)?;
        let url = remote.url().unwrap_or_default().to_string();
        let mut opts = make_fetch_options(&url);
        remote.fetch(&[] as &[&str], Some(&mut opts), None)?;
    }
    Ok(())
}

/// Check out a local branch, creating it from `origin/<name>` if needed.
/// Local modifications and untracked files are discarded.
pub fn checkout_branch(repo: &Repository, name: &str) -> Result<()> {
    validate_branch_name(name)?;

    if repo.find_branch(name, BranchType::Local).is_err() {
        let remote_ref = format!("refs/remotes/origin/{name}");
        let commit = repo
            .find_reference(&remote_ref)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| {
                AppError::Git(format!("Branch {name} not found on origin: {}", e.message()))
            })?;
        let upstream = format!("origin/{name}");
        let mut branch = repo.branch(name, &commit, false)?;
        branch.set_upstream(Some(upstream.as_str()))?;
    }

    let refname = format!("refs/heads/{name}");
    let obj = repo.revparse_single(&refname)?;
    repo.checkout_tree(&obj, Some(&mut force_checkout()))?;
    repo.set_head(&refname)?;
    Ok(())
}

/// Move the checked-out branch `name` forward to `origin/<name>`.
///
/// No-op when already up to date or ahead; fails when the histories diverged.
pub fn fast_forward(repo: &Repository, name: &str) -> Result<()> {
    let remote_ref = format!("refs/remotes/origin/{name}");
    let upstream = repo
        .find_reference(&remote_ref)
        .and_then(|r| r.peel_to_commit())
        .map_err(|e| AppError::Git(format!("Upstream origin/{name} missing: {}", e.message())))?;

    let local_ref = format!("refs/heads/{name}");
    let mut local = repo.find_reference(&local_ref)?;
    let local_commit = local.peel_to_commit()?;

    if local_commit.id() == upstream.id()
        || repo.graph_descendant_of(local_commit.id(), upstream.id())?
    {
        return Ok(());
    }
    if !repo.graph_descendant_of(upstream.id(), local_commit.id())? {
        return Err(AppError::Git(format!(
            "Cannot fast-forward {name}: local and origin have diverged"
        )));
    }

    local.set_target(upstream.id(), &format!("fast-forward {name} to origin/{name}"))?;
    repo.checkout_head(Some(&mut force_checkout()))?;
    Ok(())
}

/// Create or reset branch `name` at the current HEAD and check it out.
pub fn force_branch(repo: &Repository, name: &str) -> Result<()> {
    validate_branch_name(name)?;

    let head = repo.head()?.peel_to_commit()?;
    repo.branch(name, &head, true)?;

    let refname = format!("refs/heads/{name}");
    let obj = repo.revparse_single(&refname)?;
    repo.checkout_tree(&obj, Some(&mut force_checkout()))?;
    repo.set_head(&refname)?;
    Ok(())
}

/// Stage everything (new, modified, deleted) and commit when the staged tree
/// differs from HEAD. Returns whether a commit was made.
pub fn commit_all(repo: &Repository, message: &str, author: &Signature<'_>) -> Result<bool> {
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"].iter(), None)?;
    index.write()?;

    let tree_oid = index.write_tree()?;
    let parent = repo.head()?.peel_to_commit()?;
    if parent.tree_id() == tree_oid {
        return Ok(false);
    }

    let tree = repo.find_tree(tree_oid)?;
    repo.commit(Some("HEAD"), author, author, message, &tree, &[&parent])?;
    Ok(true)
}

/// Point `origin` at `url`.
pub fn set_origin_url(repo: &Repository, url: &str) -> Result<()> {
    repo.remote_set_url("origin", url)?;
    Ok(())
}

/// `git push -u origin <branch> --force-with-lease`.
///
/// Shells out because libgit2 has no lease semantics. Output is redacted
/// before it reaches an error.
pub async fn push_with_lease(dir: &Path, branch_name: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let output = Command::new("git")
        .args(["push", "-u", "origin", branch_name, "--force-with-lease"])
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| AppError::Git(format!("Failed to run git push: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Git(format!(
            "git push {branch_name} failed: {}",
            redact_credentials(stderr.trim())
        )));
    }
    Ok(())
}
