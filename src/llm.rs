//! Chat-completion providers.
//!
//! [`ChatModel`] is the seam between answer synthesis and the hosted LLM.
//! Providers:
//! - **[`GeminiChat`]**: Google Generative Language API (`generateContent`).
//! - **[`OpenAIChat`]**: any OpenAI-compatible `/v1/chat/completions` endpoint.
//! - **[`DisabledChat`]**: fails every call with the reason it is disabled
//!   (no provider configured, or the API key variable is unset).
//!
//! Each call is attempted exactly once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM is not available: {0}")]
    Disabled(String),
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM returned no text")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Fixed sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl SamplingParams {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<String, LlmError>;
}

// ============ Disabled ============

pub struct DisabledChat {
    reason: String,
}

impl DisabledChat {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ChatModel for DisabledChat {
    fn name(&self) -> &str {
        "disabled"
    }
    fn model(&self) -> &str {
        "none"
    }
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _params: SamplingParams,
    ) -> Result<String, LlmError> {
        Err(LlmError::Disabled(self.reason.clone()))
    }
}

// ============ Gemini ============

pub struct GeminiChat {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiChat {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

fn gemini_request(messages: &[ChatMessage], params: SamplingParams) -> GenerateRequest {
    let system: Vec<GeminiPart> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| GeminiPart {
            text: m.content.clone(),
        })
        .collect();
    let contents = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| GeminiContent {
            role: Some("user"),
            parts: vec![GeminiPart {
                text: m.content.clone(),
            }],
        })
        .collect();

    GenerateRequest {
        system_instruction: if system.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: system,
            })
        },
        contents,
        generation_config: GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_output_tokens,
        },
    }
}

/// Concatenates the text parts of the first candidate.
fn gemini_text(response: GenerateResponse) -> Result<String, LlmError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl ChatModel for GeminiChat {
    fn name(&self) -> &str {
        "gemini"
    }
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request(messages, params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        gemini_text(response.json().await?)
    }
}

// ============ OpenAI-compatible ============

pub struct OpenAIChat {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            client,
        })
    }
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAIChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn name(&self) -> &str {
        "openai"
    }
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages
                .iter()
                .map(|m| OpenAIMessage { role: m.role, content: &m.content })
                .collect::<Vec<_>>(),
            "temperature": params.temperature,
            "max_tokens": params.max_output_tokens,
        });

        let response = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OpenAIChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Builds the configured chat model. A missing API key does not prevent the
/// service from starting: the model is disabled and every answer reports
/// the error.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, LlmError> {
    if config.provider == "disabled" {
        return Ok(Arc::new(DisabledChat::new("llm.provider is disabled")));
    }
    let api_key = match config.api_key() {
        Some(key) => key,
        None => {
            tracing::warn!(env = %config.api_key_env, "LLM API key not set; chat is disabled");
            return Ok(Arc::new(DisabledChat::new(format!(
                "{} is not set",
                config.api_key_env
            ))));
        }
    };
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(config, api_key)?)),
        _ => Ok(Arc::new(GeminiChat::new(config, api_key)?)),
    }
}
