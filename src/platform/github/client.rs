use async_trait::async_trait;
use octocrab::Octocrab;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::Platform;

use super::auth::generate_app_jwt;
use super::mapper;

type TokenCache = HashMap<u64, (String, chrono::DateTime<chrono::Utc>)>;

pub struct GitHubPlatform {
    config: GitHubConfig,
    /// Cache of installation tokens: installation_id -> (token, expiry)
    token_cache: Arc<RwLock<TokenCache>>,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        // Validate the private key exists
        if !config.private_key_path.exists() {
            return Err(AppError::Config(format!(
                "GitHub App private key not found at: {}",
                config.private_key_path.display()
            )));
        }

        Ok(Self {
            config: config.clone(),
            token_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn client_with_token(&self, token: String) -> Result<Octocrab> {
        Octocrab::builder()
            .base_uri(self.config.api_base.as_str())
            .map_err(|e| AppError::Config(format!("Invalid GitHub API base: {e}")))?
            .set_connect_timeout(Some(self.config.request_timeout()))
            .set_read_timeout(Some(self.config.request_timeout()))
            .personal_token(token)
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))
    }

    /// Get an octocrab instance authenticated as an installation.
    async fn installation_client(&self, installation_id: u64) -> Result<Octocrab> {
        let token = self.get_access_token(installation_id).await?;
        self.client_with_token(token)
    }

    fn parse_repo(repo: &RepoContext) -> Result<(&str, &str)> {
        match repo.full_name.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid repo name: {}",
                repo.full_name
            ))),
        }
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn get_access_token(&self, installation_id: u64) -> Result<String> {
        // Check cache
        {
            let cache = self.token_cache.read().await;
            if let Some((token, expiry)) = cache.get(&installation_id) {
                if *expiry > chrono::Utc::now() + chrono::Duration::minutes(5) {
                    return Ok(token.clone());
                }
            }
        }

        let jwt = generate_app_jwt(self.config.app_id, &self.config.private_key_path)?;
        let client = self.client_with_token(jwt)?;

        let url = format!("/app/installations/{installation_id}/access_tokens");
        let response: serde_json::Value = client
            .post(&url, None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to create installation token: {e}")))?;

        let token = response["token"]
            .as_str()
            .ok_or_else(|| AppError::GitHubApi("No token in response".to_string()))?
            .to_string();

        let expires_at = response["expires_at"]
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|| chrono::Utc::now() + chrono::Duration::hours(1));

        tracing::debug!(installation_id, %expires_at, "Minted installation token");

        let mut cache = self.token_cache.write().await;
        cache.insert(installation_id, (token.clone(), expires_at));

        Ok(token)
    }

    async fn get_issue(&self, repo: &RepoContext, issue_number: u64) -> Result<Issue> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        let issue = client.issues(owner, name).get(issue_number).await?;

        Ok(mapper::map_issue(&issue))
    }

    async fn get_pull_request(&self, repo: &RepoContext, pr_number: u64) -> Result<PullRequest> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        let pr = client.pulls(owner, name).get(pr_number).await?;

        Ok(mapper::map_pull_request(pr))
    }

    async fn find_open_pull_request(
        &self,
        repo: &RepoContext,
        head_branch: &str,
    ) -> Result<Option<PullRequest>> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        // Filtered server-side, so the match is never on a later page.
        let page = client
            .pulls(owner, name)
            .list()
            .state(octocrab::params::State::Open)
            .head(format!("{owner}:{head_branch}"))
            .per_page(10)
            .send()
            .await?;

        Ok(page
            .items
            .into_iter()
            .map(mapper::map_pull_request)
            .find(|pr| pr.head_branch == head_branch))
    }

    async fn create_pull_request(
        &self,
        repo: &RepoContext,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        let created = client
            .pulls(owner, name)
            .create(&pr.title, &pr.head_branch, &pr.base_branch)
            .body(&pr.body)
            .send()
            .await?;

        Ok(mapper::map_pull_request(created))
    }

    async fn post_comment(&self, repo: &RepoContext, issue_number: u64, body: &str) -> Result<()> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        client
            .issues(owner, name)
            .create_comment(issue_number, body)
            .await?;

        Ok(())
    }

    async fn get_labels(&self, repo: &RepoContext, issue_number: u64) -> Result<Vec<String>> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        let page = client
            .issues(owner, name)
            .list_labels_for_issue(issue_number)
            .per_page(100)
            .send()
            .await?;

        Ok(page.items.into_iter().map(|l| l.name).collect())
    }

    async fn replace_labels(
        &self,
        repo: &RepoContext,
        issue_number: u64,
        labels: &[String],
    ) -> Result<()> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        client
            .issues(owner, name)
            .replace_all_labels(issue_number, labels)
            .await?;

        Ok(())
    }

    async fn get_pull_request_diff(&self, repo: &RepoContext, pr_number: u64) -> Result<String> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        Ok(client.pulls(owner, name).get_diff(pr_number).await?)
    }

    async fn get_commit_status(&self, repo: &RepoContext, sha: &str) -> Result<CommitStatus> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        let url = format!("/repos/{owner}/{name}/commits/{sha}/status");
        let response: serde_json::Value = client.get(&url, None::<&()>).await?;

        Ok(mapper::map_commit_status(&response))
    }

    async fn submit_review(
        &self,
        repo: &RepoContext,
        pr_number: u64,
        body: &str,
        event: ReviewEvent,
    ) -> Result<()> {
        let client = self.installation_client(repo.installation_id).await?;
        let (owner, name) = Self::parse_repo(repo)?;

        let url = format!("/repos/{owner}/{name}/pulls/{pr_number}/reviews");
        let request = serde_json::json!({ "body": body, "event": event.as_str() });
        let _: serde_json::Value = client.post(&url, Some(&request)).await?;

        Ok(())
    }
}
