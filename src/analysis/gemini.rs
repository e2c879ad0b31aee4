// =============================================================================
// Google Gemini generateContent backend
// =============================================================================
//
// POST /v1beta/models/{model}:generateContent
//
// The persona, the data and the question travel as one text part. A response
// can come back without candidates, with a SAFETY finish reason, or with a
// prompt-level block reason; all of these are reported as typed errors rather
// than empty text.
// =============================================================================

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{status_error, transport_error, AnalysisClient, SYSTEM_MESSAGE};
use crate::error::AnalysisError;
use crate::types::Backend;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini text-only client.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// `model` is the bare id (e.g. `gemini-2.5-flash`); a `models/` prefix is stripped.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| transport_error(Backend::Gemini, e))?;

        let model: String = model.into();
        Ok(Self {
            api_key: api_key.into(),
            model: model.trim_start_matches("models/").to_string(),
            temperature,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    fn build_body(&self, prompt_text: &str, user_question: &str, max_output_tokens: u32) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": full_prompt(prompt_text, user_question) }]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": max_output_tokens
            }
        })
    }
}

fn full_prompt(prompt_text: &str, user_question: &str) -> String {
    format!(
        "{SYSTEM_MESSAGE}\n\n\
         Here is recent market and technical data for one instrument:\n\
         {prompt_text}\n\n\
         User question:\n\
         {user_question}"
    )
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &Value) -> Result<String, AnalysisError> {
    if body.pointer("/promptFeedback/blockReason").is_some() {
        return Err(AnalysisError::SafetyBlocked);
    }

    let candidate = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or(AnalysisError::EmptyResponse)?;

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if finish_reason.to_ascii_uppercase().ends_with("SAFETY") {
        return Err(AnalysisError::SafetyBlocked);
    }

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    #[instrument(skip(self, prompt_text, user_question), name = "gemini::generate")]
    async fn generate(
        &self,
        prompt_text: &str,
        user_question: &str,
        max_output_tokens: u32,
    ) -> Result<String, AnalysisError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.build_body(prompt_text, user_question, max_output_tokens);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(Backend::Gemini, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(Backend::Gemini, status, &text));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| transport_error(Backend::Gemini, e))?;

        let text = extract_text(&payload)?;
        debug!(model = %self.model, chars = text.len(), "gemini analysis received");
        Ok(text)
    }

    fn backend(&self) -> Backend {
        Backend::Gemini
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new("g-key", "models/gemini-2.5-flash", 0.7, 5).unwrap()
    }

    #[test]
    fn model_prefix_is_stripped() {
        assert!(format!("{:?}", client()).contains("model: \"gemini-2.5-flash\""));
    }

    #[test]
    fn body_carries_generation_config() {
        let body = client().build_body("DATA", "Risks?", 800);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 800);
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("You are FinGPT"));
        assert!(text.ends_with(
            "Here is recent market and technical data for one instrument:\nDATA\n\nUser question:\nRisks?"
        ));
    }

    #[test]
    fn joins_text_parts() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": " Trend is up. " }, { "text": "RSI is high.\n" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(extract_text(&body).unwrap(), "Trend is up. RSI is high.");
    }

    #[test]
    fn safety_finish_reason_is_blocked() {
        let body = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        assert!(matches!(extract_text(&body), Err(AnalysisError::SafetyBlocked)));

        let prompt_blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(extract_text(&prompt_blocked), Err(AnalysisError::SafetyBlocked)));
    }

    #[test]
    fn no_candidates_or_no_text_is_empty() {
        assert!(matches!(extract_text(&json!({})), Err(AnalysisError::EmptyResponse)));
        let blank = json!({ "candidates": [{ "content": { "parts": [] }, "finishReason": "STOP" }] });
        assert!(matches!(extract_text(&blank), Err(AnalysisError::EmptyResponse)));
    }

    #[test]
    fn debug_redacts_key() {
        assert!(!format!("{:?}", client()).contains("g-key"));
    }
}
