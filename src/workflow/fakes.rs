//! In-memory collaborators for exercising the workflows.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::llm::CompletionModel;
use crate::patch::{PatchError, UnifiedDiff};
use crate::platform::types::{
    CommitStatus, CreatePullRequest, Issue, PullRequest, RepoContext, ReviewEvent,
};
use crate::platform::Platform;
use crate::workspace::{RepoHandle, WorkspaceOps};

use super::Orchestrator;

pub const VALID_ANSWER: &str = "Plan:\n1. Add greeting file\n\n```diff\ndiff --git a/hello.txt b/hello.txt\nnew file mode 100644\n--- /dev/null\n+++ b/hello.txt\n@@ -0,0 +1 @@\n+hello\n```\n";

pub fn repo() -> RepoContext {
    RepoContext::new(7, "octo/widgets", None)
}

pub fn pull_request(number: u64, head: &str, body: &str) -> PullRequest {
    PullRequest {
        number,
        title: format!("PR {number}"),
        body: body.to_string(),
        head_branch: head.to_string(),
        head_sha: format!("sha-{number}"),
        base_branch: "master".to_string(),
        html_url: format!("https://github.com/octo/widgets/pull/{number}"),
    }
}

pub fn issue(number: u64, title: &str, body: &str) -> Issue {
    Issue {
        number,
        title: title.to_string(),
        body: body.to_string(),
        labels: Vec::new(),
    }
}

#[derive(Default)]
pub struct PlatformState {
    pub issues: HashMap<u64, Issue>,
    pub pull_requests: Vec<PullRequest>,
    pub labels: HashMap<u64, Vec<String>>,
    pub comments: Vec<(u64, String)>,
    pub created: Vec<CreatePullRequest>,
    pub label_writes: usize,
    pub label_reads: usize,
    pub fail_label_reads: bool,
    /// Label reads succeed this many times, then fail.
    pub fail_label_reads_after: Option<usize>,
    pub fail_label_writes: bool,
    pub fail_comments: bool,
    pub diffs: HashMap<u64, String>,
    pub commit_status: Option<CommitStatus>,
    pub reviews: Vec<(u64, String, ReviewEvent)>,
    /// Review events the platform refuses, as GitHub does for an App's own PR.
    pub rejected_review_events: Vec<ReviewEvent>,
}

#[derive(Default)]
pub struct FakePlatform {
    pub state: Mutex<PlatformState>,
}

impl FakePlatform {
    pub fn with<F: FnOnce(&mut PlatformState)>(&self, f: F) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn labels(&self, number: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .get(&number)
            .cloned()
            .unwrap_or_default()
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created.len()
    }

    pub fn label_writes(&self) -> usize {
        self.state.lock().unwrap().label_writes
    }

    pub fn reviews(&self) -> Vec<(u64, String, ReviewEvent)> {
        self.state.lock().unwrap().reviews.clone()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn get_access_token(&self, installation_id: u64) -> Result<String> {
        Ok(format!("token-{installation_id}"))
    }

    async fn get_issue(&self, _repo: &RepoContext, issue_number: u64) -> Result<Issue> {
        self.state
            .lock()
            .unwrap()
            .issues
            .get(&issue_number)
            .cloned()
            .ok_or_else(|| AppError::GitHubApi(format!("issue {issue_number} not found")))
    }

    async fn get_pull_request(&self, _repo: &RepoContext, pr_number: u64) -> Result<PullRequest> {
        self.state
            .lock()
            .unwrap()
            .pull_requests
            .iter()
            .find(|pr| pr.number == pr_number)
            .cloned()
            .ok_or_else(|| AppError::GitHubApi(format!("pull request {pr_number} not found")))
    }

    async fn find_open_pull_request(
        &self,
        _repo: &RepoContext,
        head_branch: &str,
    ) -> Result<Option<PullRequest>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pull_requests
            .iter()
            .find(|pr| pr.head_branch == head_branch)
            .cloned())
    }

    async fn create_pull_request(
        &self,
        _repo: &RepoContext,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let mut state = self.state.lock().unwrap();
        let number = 100 + state.pull_requests.len() as u64;
        let created = PullRequest {
            number,
            title: pr.title.clone(),
            body: pr.body.clone(),
            head_branch: pr.head_branch.clone(),
            head_sha: format!("sha-{number}"),
            base_branch: pr.base_branch.clone(),
            html_url: format!("https://github.com/octo/widgets/pull/{number}"),
        };
        state.created.push(pr.clone());
        state.pull_requests.push(created.clone());
        Ok(created)
    }

    async fn post_comment(&self, _repo: &RepoContext, issue_number: u64, body: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_comments {
            return Err(AppError::GitHubApi("comments unavailable".to_string()));
        }
        state.comments.push((issue_number, body.to_string()));
        Ok(())
    }

    async fn get_labels(&self, _repo: &RepoContext, issue_number: u64) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.label_reads += 1;
        let exhausted = state
            .fail_label_reads_after
            .is_some_and(|ok| state.label_reads > ok);
        if state.fail_label_reads || exhausted {
            return Err(AppError::GitHubApi("labels unavailable".to_string()));
        }
        Ok(state.labels.get(&issue_number).cloned().unwrap_or_default())
    }

    async fn replace_labels(
        &self,
        _repo: &RepoContext,
        issue_number: u64,
        labels: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_label_writes {
            return Err(AppError::GitHubApi("labels unavailable".to_string()));
        }
        state.label_writes += 1;
        state.labels.insert(issue_number, labels.to_vec());
        Ok(())
    }

    async fn get_pull_request_diff(&self, _repo: &RepoContext, pr_number: u64) -> Result<String> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .diffs
            .get(&pr_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_commit_status(&self, _repo: &RepoContext, sha: &str) -> Result<CommitStatus> {
        self.state
            .lock()
            .unwrap()
            .commit_status
            .clone()
            .ok_or_else(|| AppError::GitHubApi(format!("no status for {sha}")))
    }

    async fn submit_review(
        &self,
        _repo: &RepoContext,
        pr_number: u64,
        body: &str,
        event: ReviewEvent,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.rejected_review_events.contains(&event) {
            return Err(AppError::GitHubApi(format!(
                "Can not {event} your own pull request"
            )));
        }
        state.reviews.push((pr_number, body.to_string(), event));
        Ok(())
    }
}

pub struct FakeModel {
    answer: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    /// How long each completion takes.
    pub delay: Mutex<Option<Duration>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeModel {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Most completions that were running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionModel for FakeModel {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user.to_string());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        Ok(self.answer.clone())
    }
}

#[derive(Default)]
pub struct WorkspaceLog {
    pub new_branches: Vec<String>,
    pub existing_branches: Vec<String>,
    pub applied: Vec<String>,
    pub commits: Vec<String>,
    pub origins: Vec<String>,
    pub pushes: Vec<String>,
}

pub struct FakeWorkspace {
    /// Whether `commit_all` reports changes.
    pub dirty: AtomicBool,
    pub fail_push: AtomicBool,
    pub log: Mutex<WorkspaceLog>,
}

impl Default for FakeWorkspace {
    fn default() -> Self {
        Self {
            dirty: AtomicBool::new(true),
            fail_push: AtomicBool::new(false),
            log: Mutex::new(WorkspaceLog::default()),
        }
    }
}

impl FakeWorkspace {
    pub fn applied(&self) -> Vec<String> {
        self.log.lock().unwrap().applied.clone()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.log.lock().unwrap().pushes.clone()
    }

    pub fn commits(&self) -> Vec<String> {
        self.log.lock().unwrap().commits.clone()
    }
}

#[async_trait]
impl WorkspaceOps for FakeWorkspace {
    fn workspace_path(&self, repo_full_name: &str, logical_key: &str) -> PathBuf {
        PathBuf::from("/work").join(format!("{}_{logical_key}", repo_full_name.replace('/', "_")))
    }

    async fn ensure_cloned(&self, path: &Path, _remote_url: &str) -> Result<RepoHandle> {
        Ok(RepoHandle {
            path: path.to_path_buf(),
        })
    }

    async fn checkout_new_branch(&self, _repo: &RepoHandle, branch: &str) -> Result<()> {
        self.log.lock().unwrap().new_branches.push(branch.to_string());
        Ok(())
    }

    async fn checkout_existing_branch(&self, _repo: &RepoHandle, branch: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .existing_branches
            .push(branch.to_string());
        Ok(())
    }

    async fn apply_patch(&self, _repo: &RepoHandle, diff: &UnifiedDiff) -> Result<()> {
        if !diff.looks_like_patch() {
            return Err(PatchError::NotAPatch.into());
        }
        self.log.lock().unwrap().applied.push(diff.to_string());
        Ok(())
    }

    async fn commit_all(&self, _repo: &RepoHandle, message: &str) -> Result<bool> {
        if !self.dirty.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.log.lock().unwrap().commits.push(message.to_string());
        Ok(true)
    }

    async fn set_origin_with_token(
        &self,
        _repo: &RepoHandle,
        remote_url: &str,
        token: &str,
    ) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .origins
            .push(format!("{remote_url}|{token}"));
        Ok(())
    }

    async fn push(&self, _repo: &RepoHandle, branch: &str) -> Result<()> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(AppError::Workspace("push rejected".to_string()));
        }
        self.log.lock().unwrap().pushes.push(branch.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub platform: Arc<FakePlatform>,
    pub model: Arc<FakeModel>,
    pub workspace: Arc<FakeWorkspace>,
}

impl Harness {
    pub fn new(answer: &str) -> Self {
        Self {
            platform: Arc::new(FakePlatform::default()),
            model: Arc::new(FakeModel::new(answer)),
            workspace: Arc::new(FakeWorkspace::default()),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.platform.clone(),
            self.model.clone(),
            self.workspace.clone(),
            "master",
            5,
        )
    }
}
