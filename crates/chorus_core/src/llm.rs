//! Generation step: ask a model whether and what a persona says
//!
//! The scheduler only sees [`Generator`]. [`LlmGenerator`] builds the persona
//! prompt and hands it to a [`CompletionProvider`], which is a thin HTTP
//! client for one provider's API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ProviderKind};
use crate::persona::Persona;
use crate::prompt::{SILENCE_MARKER, build_decision_prompt};
use crate::{CoreError, Result};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// A persona's decision for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Responded(String),
    Silent,
}

impl Reply {
    /// Interpret raw model output
    pub fn from_completion(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text.contains(SILENCE_MARKER) {
            Reply::Silent
        } else {
            Reply::Responded(text.to_string())
        }
    }
}

/// Decides for one persona whether to speak, and produces the text if so
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn decide_and_generate(&self, persona: &Persona) -> Result<Reply>;
}

/// One-shot completion: system prompt and a single user turn in, text out
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

pub struct LlmGenerator {
    provider: Arc<dyn CompletionProvider>,
    vips: Vec<String>,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, vips: Vec<String>) -> Self {
        Self { provider, vips }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn decide_and_generate(&self, persona: &Persona) -> Result<Reply> {
        if persona.messages().is_empty() {
            return Ok(Reply::Silent);
        }

        let prompt = build_decision_prompt(persona, &self.vips, &chrono::Local::now());
        let started = std::time::Instant::now();
        let text = self
            .provider
            .complete(persona.instructions(), &prompt)
            .await?;
        tracing::debug!(
            "{} completion for {} took {:?}",
            self.provider.name(),
            persona.name(),
            started.elapsed()
        );

        Ok(Reply::from_completion(&text))
    }
}

/// Build the configured provider
pub fn provider_from_config(config: &ModelConfig) -> Result<Arc<dyn CompletionProvider>> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| CoreError::invalid_config("model.api_key", "no API key configured"))?;

    let http = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|cause| CoreError::ProviderRequestFailed {
            provider: config.provider.as_str().to_string(),
            model: config.model_name().to_string(),
            cause,
        })?;

    let provider: Arc<dyn CompletionProvider> = match config.provider {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider {
            http,
            api_key,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_URL.to_string()),
            model: config.model_name().to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider {
            http,
            api_key,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_URL.to_string()),
            model: config.model_name().to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }),
    };

    tracing::info!(
        "Using {} model {}",
        provider.name(),
        provider.model()
    );
    Ok(provider)
}

async fn post_json<B, R>(
    provider: &str,
    model: &str,
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let request_failed = |cause| CoreError::ProviderRequestFailed {
        provider: provider.to_string(),
        model: model.to_string(),
        cause,
    };

    let response = request.json(body).send().await.map_err(request_failed)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CoreError::ProviderErrorResponse {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    response.json::<R>().await.map_err(request_failed)
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'a str,
    content: &'a str,
}

pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [ChatTurn<'a>; 1],
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: [ChatTurn {
                role: "user",
                content: prompt,
            }],
        };
        let request = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        let response: AnthropicResponse =
            post_json(self.name(), &self.model, request, &body).await?;

        response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| CoreError::ProviderEmptyResponse {
                provider: self.name().to_string(),
                model: self.model.clone(),
            })
    }
}

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [ChatTurn<'a>; 2],
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let body = OpenAiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: [
                ChatTurn {
                    role: "system",
                    content: system,
                },
                ChatTurn {
                    role: "user",
                    content: prompt,
                },
            ],
        };
        let request = self.http.post(&self.url).bearer_auth(&self.api_key);

        let response: OpenAiResponse = post_json(self.name(), &self.model, request, &body).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CoreError::ProviderEmptyResponse {
                provider: self.name().to_string(),
                model: self.model.clone(),
            })
    }
}
