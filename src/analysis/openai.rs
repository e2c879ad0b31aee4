// =============================================================================
// OpenAI Chat Completions backend
// =============================================================================
//
// SECURITY: the API key is sent only as a bearer header and never logged.
// =============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{status_error, transport_error, AnalysisClient, SYSTEM_MESSAGE};
use crate::error::AnalysisError;
use crate::types::Backend;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| transport_error(Backend::OpenAi, e))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    fn build_request<'a>(&'a self, prompt_text: &str, user_question: &str, max_tokens: u32) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_content(prompt_text, user_question),
                },
            ],
            temperature: self.temperature,
            max_tokens,
        }
    }
}

fn user_content(prompt_text: &str, user_question: &str) -> String {
    format!(
        "Here is recent market and technical data for one instrument.\n\n\
         {prompt_text}\n\n\
         User question:\n\
         {user_question}"
    )
}

/// Pull the trimmed text of the first choice out of a response body.
fn extract_text(body: ChatResponse) -> Result<String, AnalysisError> {
    let choice = body.choices.into_iter().next().ok_or(AnalysisError::EmptyResponse)?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(AnalysisError::SafetyBlocked);
    }

    let text = choice.message.content.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[async_trait]
impl AnalysisClient for OpenAiClient {
    #[instrument(skip(self, prompt_text, user_question), name = "openai::generate")]
    async fn generate(
        &self,
        prompt_text: &str,
        user_question: &str,
        max_output_tokens: u32,
    ) -> Result<String, AnalysisError> {
        let request = self.build_request(prompt_text, user_question, max_output_tokens);

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(Backend::OpenAi, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(Backend::OpenAi, status, &body));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| transport_error(Backend::OpenAi, e))?;

        let text = extract_text(body)?;
        debug!(model = %self.model, chars = text.len(), "openai analysis received");
        Ok(text)
    }

    fn backend(&self) -> Backend {
        Backend::OpenAi
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}
