use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{CHUNK_FAILED_MARKER, ChunkItem, ChunkTranslator, SegmentTranslation};
use crate::config::TranslateConfig;
use crate::error::{Result, SublateError};

/// Maximum attempts per chunk before degrading to sentinel results.
pub const MAX_RETRIES: u32 = 3;

/// Fixed delay between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// The structured payload the model must return.
#[derive(Debug, Deserialize)]
struct TranslationsEnvelope {
    translations: Vec<SegmentTranslation>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Chunk translator backed by an OpenAI-compatible chat-completions
/// endpoint with structured JSON output.
pub struct LlmTranslator {
    client: Client,
    config: TranslateConfig,
}

impl LlmTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| SublateError::Translation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// One chat-completions round trip for a chunk. Any transport, HTTP,
    /// or structural failure surfaces as an error for the retry loop.
    async fn request_chunk(
        &self,
        chunk: &[ChunkItem],
        target_language: &str,
    ) -> Result<Vec<SegmentTranslation>> {
        let prompt = build_user_prompt(chunk, target_language)?;
        debug!("Translation prompt:\n{}", prompt);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: build_system_prompt(target_language),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                format: "json_object",
            },
        };

        let url = format!(
            "{}/chat/completions",
            self.config.api_base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SublateError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SublateError::Translation(format!(
                "LLM API error {}: {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| SublateError::Translation(format!("Failed to parse response: {}", e)))?;

        let content = chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| SublateError::Translation("Empty completion response".to_string()))?;

        debug!("Raw model response: {}", content);

        parse_translations(&content)
    }

    /// List the model ids available at the configured endpoint.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.config.api_base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| SublateError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SublateError::Translation(format!(
                "Failed to fetch models from API: {} {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SublateError::Translation(format!("Failed to read response: {}", e)))?;

        parse_models(&body)
    }
}

#[async_trait]
impl ChunkTranslator for LlmTranslator {
    async fn translate_chunk(
        &self,
        chunk: &[ChunkItem],
        target_language: &str,
    ) -> Result<Vec<SegmentTranslation>> {
        Ok(translate_with_retries(chunk, MAX_RETRIES, RETRY_DELAY, || {
            self.request_chunk(chunk, target_language)
        })
        .await)
    }
}

/// Retry loop shared by the LLM translator: up to `max_retries` attempts
/// with a fixed delay in between; after the final failure the chunk
/// degrades to same-cardinality sentinel results so the caller always
/// receives one entry per requested segment.
pub(crate) async fn translate_with_retries<F, Fut>(
    chunk: &[ChunkItem],
    max_retries: u32,
    retry_delay: Duration,
    mut request: F,
) -> Vec<SegmentTranslation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<SegmentTranslation>>>,
{
    if chunk.is_empty() {
        return Vec::new();
    }

    for attempt in 1..=max_retries {
        match request().await {
            Ok(translations) => {
                if translations.len() != chunk.len() {
                    warn!(
                        "Translation count mismatch: requested {} segments, received {}",
                        chunk.len(),
                        translations.len()
                    );
                }
                return translations;
            }
            Err(e) => {
                warn!("Attempt {}/{} failed: {}", attempt, max_retries, e);
                if attempt < max_retries {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    error!(
        "Chunk of {} segments failed after {} attempts, marking every segment as failed",
        chunk.len(),
        max_retries
    );

    chunk
        .iter()
        .map(|item| SegmentTranslation {
            id: item.id,
            translated_text: CHUNK_FAILED_MARKER.to_string(),
            original_text: None,
        })
        .collect()
}

fn build_system_prompt(target_language: &str) -> String {
    format!(
        "You are a professional subtitle translator translating subtitles into {}. \
         Your output must be a valid JSON object.",
        target_language
    )
}

fn build_user_prompt(chunk: &[ChunkItem], target_language: &str) -> Result<String> {
    let segments_json = serde_json::to_string_pretty(chunk)?;

    Ok(format!(
        r#"You are a professional subtitle translator. Your task is to translate the following subtitle segments into {target_language}.
The input is a JSON array of objects, where each object has an "id" and a "text" from the original ASR (Automatic Speech Recognition).

RULES:
1. Translate each segment independently.
2. Never move content across segment boundaries and never reorder segments.
3. Prefer fidelity to the timing-segment boundaries over naturalness of phrasing across segments, but keep the phrasing natural within each segment where possible.
4. Maintain the original meaning and fix obvious ASR errors based on context.

Your output MUST be a valid JSON object containing a key "translations" which is an array of objects, each with the original "id" and the "translated_text".
Do NOT add any explanations or text outside of the JSON object. The structure must be:
{{
  "translations": [
    {{
      "id": <original_id>,
      "translated_text": "<your_translation>"
    }},
    ...
  ]
}}

Here is the JSON data to translate:
{segments_json}"#
    ))
}

/// Parse the model's structured output into translations. Code fences
/// are stripped first; anything else that fails to parse as the expected
/// envelope is a retryable failure.
fn parse_translations(content: &str) -> Result<Vec<SegmentTranslation>> {
    let cleaned = strip_code_fences(content);

    let envelope: TranslationsEnvelope = serde_json::from_str(cleaned).map_err(|e| {
        SublateError::Translation(format!("Invalid JSON structure in response: {}", e))
    })?;

    Ok(envelope.translations)
}

/// Parse an OpenAI-compatible `/models` listing into model ids.
fn parse_models(body: &str) -> Result<Vec<String>> {
    let response: ModelsResponse = serde_json::from_str(body)
        .map_err(|e| SublateError::Translation(format!("Invalid models response: {}", e)))?;

    Ok(response.data.into_iter().map(|entry| entry.id).collect())
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();

    for prefix in ["```json", "```"] {
        if let Some(inner) = text.strip_prefix(prefix) {
            if let Some(inner) = inner.strip_suffix("```") {
                return inner.trim();
            }
        }
    }

    text
}
