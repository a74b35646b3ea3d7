use serde::{Deserialize, Serialize};

/// Repository a unit of work operates on, as reported by the triggering event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    pub installation_id: u64,
    /// `owner/name`.
    pub full_name: String,
    /// Plain HTTPS clone URL (no credentials).
    pub clone_url: String,
}

impl RepoContext {
    pub fn new(installation_id: u64, full_name: &str, clone_url: Option<&str>) -> Self {
        let clone_url = match clone_url {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("https://github.com/{full_name}.git"),
        };
        Self {
            installation_id,
            full_name: full_name.to_string(),
            clone_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub head_branch: String,
    /// Commit the head branch pointed at when the pull request was fetched.
    pub head_sha: String,
    pub base_branch: String,
    pub html_url: String,
}

#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
}

/// Event attached to a submitted pull request review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    Approve,
    RequestChanges,
    Comment,
}

impl ReviewEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewEvent::Approve => "APPROVE",
            ReviewEvent::RequestChanges => "REQUEST_CHANGES",
            ReviewEvent::Comment => "COMMENT",
        }
    }
}

impl std::fmt::Display for ReviewEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined CI status of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    /// `success`, `failure`, `pending` or `error`.
    pub state: String,
    /// One `<context>: <state> <description>` line per reported status.
    pub details: Vec<String>,
}
