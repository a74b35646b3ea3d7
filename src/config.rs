use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub reviewer: ReviewerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    pub app_id: u64,
    pub private_key_path: PathBuf,
    pub webhook_secret: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Timeout for metadata calls (issues, labels, pulls, tokens).
    #[serde(default = "default_github_timeout")]
    pub request_timeout_secs: u64,
}

// Manual Debug impl to avoid leaking the webhook secret
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("app_id", &self.app_id)
            .field("private_key_path", &self.private_key_path)
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl GitHubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Wire format spoken by the completion endpoint.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// `foundationModels/v1/completion` style endpoint.
    #[default]
    Foundation,
    /// Anthropic Messages API.
    Anthropic,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the provider's default endpoint base.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Timeout for a single generation call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    pub fn base_url(&self) -> &str {
        let base = match (&self.base_url, self.provider) {
            (Some(url), _) => url.as_str(),
            (None, LlmProvider::Foundation) => "https://llm.api.cloud.yandex.net",
            (None, LlmProvider::Anthropic) => "https://api.anthropic.com",
        };
        base.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_workspace_dir(),
            base_branch: default_base_branch(),
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Number of fix iterations allowed per pull request.
    #[serde(default = "default_max_iters")]
    pub max_iters: u32,
    /// How long shutdown waits for in-flight units of work.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iters: default_max_iters(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// The built-in reviewer for pull requests on `issue-<n>` branches.
#[derive(Debug, Deserialize, Clone)]
pub struct ReviewerConfig {
    /// Review on `pull_request` opened/reopened/synchronize events.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_diff_chars")]
    pub max_diff_chars: usize,
    #[serde(default = "default_max_ci_chars")]
    pub max_ci_chars: usize,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_diff_chars: default_max_diff_chars(),
            max_ci_chars: default_max_ci_chars(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_github_timeout() -> u64 {
    60
}

fn default_model() -> String {
    "gpt://b1g00000000000000000/yandexgpt-lite".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_llm_timeout() -> u64 {
    180
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("/tmp/patchloop-workdir")
}

fn default_base_branch() -> String {
    "master".to_string()
}

fn default_author_name() -> String {
    "Patchloop Bot".to_string()
}

fn default_author_email() -> String {
    "patchloop[bot]@users.noreply.github.com".to_string()
}

fn default_max_iters() -> u32 {
    5
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_max_diff_chars() -> usize {
    120_000
}

fn default_max_ci_chars() -> usize {
    60_000
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("patchloop").required(false));
        }

        // Environment variable overrides with PATCHLOOP_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("PATCHLOOP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(AppError::Config("llm.api_key is required".to_string()));
        }
        if self.github.webhook_secret.is_empty() {
            return Err(AppError::Config(
                "github.webhook_secret is required".to_string(),
            ));
        }
        if self.workspace.base_branch.starts_with('-') {
            return Err(AppError::Config(format!(
                "Invalid base branch: {}",
                self.workspace.base_branch
            )));
        }
        Ok(())
    }

    pub fn webhook_secret(&self) -> &str {
        &self.github.webhook_secret
    }
}
