use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderSettings;

/// What gets sent to a model: one system and one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPacket {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
}

/// Anything that can turn a prompt into raw model text.
#[async_trait]
pub trait DraftProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &PromptPacket) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<Message<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint
/// (OpenAI, OpenRouter, Groq).
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    label: String,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("API key missing for {:?} provider", settings.kind))?;
        Ok(ChatCompletionsProvider {
            client: reqwest::Client::new(),
            label: format!("{:?}", settings.kind).to_lowercase(),
            endpoint: format!("{}/chat/completions", settings.base_url().trim_end_matches('/')),
            model: settings.model().to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DraftProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, prompt: &PromptPacket) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: prompt.temperature,
            messages: vec![
                Message {
                    role: "system",
                    content: &prompt.system_prompt,
                },
                Message {
                    role: "user",
                    content: &prompt.user_prompt,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        debug!(provider = %self.label, model = %self.model, "calling chat completions");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.label))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} error {}: {}", self.label, status, body));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or_else(|| anyhow!("Empty response"))?
            .trim()
            .to_string();
        Ok(content)
    }
}
