use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{AppError, Result};

use super::CompletionModel;

/// Client for `foundationModels/v1/completion` style endpoints.
pub struct FoundationClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model_uri: String,
    temperature: f32,
    max_tokens: u32,
}

impl FoundationClient {
    pub fn new(client: Client, config: &LlmConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/foundationModels/v1/completion", config.base_url()),
            api_key: config.api_key.clone(),
            model_uri: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn request<'a>(&'a self, system: &'a str, user: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model_uri: &self.model_uri,
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            },
            messages: vec![
                Message {
                    role: "system",
                    text: system,
                },
                Message {
                    role: "user",
                    text: user,
                },
            ],
        }
    }
}

#[async_trait]
impl CompletionModel for FoundationClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(&self.request(system, user))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }

        let body: serde_json::Value = response.json().await?;
        let text = answer_text(&body)?;
        tracing::info!(chars = text.len(), "Completion received");
        Ok(text)
    }
}

/// Pull `result.alternatives[0].message.text` out of a response body.
fn answer_text(body: &serde_json::Value) -> Result<String> {
    let parsed: CompletionResponse = serde_json::from_value(body.clone())
        .map_err(|_| AppError::Llm(format!("Unexpected completion response: {body}")))?;

    parsed
        .result
        .alternatives
        .into_iter()
        .next()
        .map(|a| a.message.text)
        .ok_or_else(|| AppError::Llm(format!("Unexpected completion response: {body}")))
}

// --- Request types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: &'a str,
    completion_options: CompletionOptions,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    text: &'a str,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Debug, Deserialize)]
struct AlternativeMessage {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;

    fn config() -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::Foundation,
            api_key: "key".to_string(),
            model: "gpt://folder/yandexgpt-lite".to_string(),
            base_url: Some("https://llm.example.net/".to_string()),
            temperature: 0.2,
            max_tokens: 2000,
            timeout_secs: 180,
        }
    }

    #[test]
    fn test_endpoint_and_request_shape() {
        let client = FoundationClient::new(Client::new(), &config());
        assert_eq!(
            client.endpoint,
            "https://llm.example.net/foundationModels/v1/completion"
        );

        let value = serde_json::to_value(client.request("sys", "usr")).unwrap();
        assert_eq!(value["modelUri"], "gpt://folder/yandexgpt-lite");
        assert_eq!(value["completionOptions"]["stream"], false);
        assert_eq!(value["completionOptions"]["maxTokens"], 2000);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["text"], "usr");
    }

    #[test]
    fn test_answer_text() {
        let body = serde_json::json!({
            "result": {
                "alternatives": [{"message": {"role": "assistant", "text": "diff --git a/x b/x"}, "status": "ALTERNATIVE_STATUS_FINAL"}],
                "usage": {"inputTextTokens": "10"}
            }
        });
        assert_eq!(answer_text(&body).unwrap(), "diff --git a/x b/x");
    }

    #[test]
    fn test_answer_text_unexpected_shape() {
        let body = serde_json::json!({"error": "nope"});
        let err = answer_text(&body).unwrap_err();
        assert!(err.to_string().contains("Unexpected completion response"));

        let empty = serde_json::json!({"result": {"alternatives": []}});
        assert!(answer_text(&empty).is_err());
    }
}
