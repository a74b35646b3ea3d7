pub mod anthropic;
pub mod foundation;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{AppError, Result};

/// A single-shot text completion: one system instruction, one user prompt,
/// plain text back.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Build the completion client selected by `llm.provider`.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn CompletionModel>> {
    let http = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {e}")))?;

    let model: Arc<dyn CompletionModel> = match config.provider {
        LlmProvider::Foundation => Arc::new(foundation::FoundationClient::new(http, config)),
        LlmProvider::Anthropic => Arc::new(anthropic::AnthropicClient::new(http, config)),
    };
    Ok(model)
}

/// Read a non-2xx response into an error that keeps status and body.
async fn error_from_response(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AppError::Llm(format!("API returned {status}: {body}"))
}
