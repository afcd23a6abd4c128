//! Provider clients behind one normalized chat shape
//!
//! Two upstreams: the OpenRouter hosted chat-completions API, which takes a
//! full conversation, and a local Ollama instance, whose generate endpoint
//! only accepts a single prompt string.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// Maximum characters of a raw upstream body kept in logs and errors
const BODY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub provider: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid provider: {0}")]
    UnknownProvider(String),

    #[error("provider {0} not configured")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

/// Build the provider named by the request. Unknown names are a caller
/// error, not a server fault.
pub fn create_provider(
    name: &str,
    config: &Config,
    model: Option<&str>,
) -> Result<Box<dyn Provider>, ProviderError> {
    match name {
        "openrouter" => {
            let openrouter = config
                .providers
                .openrouter
                .as_ref()
                .ok_or(ProviderError::NotConfigured("openrouter"))?;
            let model = model.unwrap_or(&openrouter.model);
            Ok(Box::new(OpenRouterProvider::new(openrouter, model)))
        }
        "ollama" => {
            let ollama = config
                .providers
                .ollama
                .as_ref()
                .ok_or(ProviderError::NotConfigured("ollama"))?;
            let model = model.unwrap_or(&ollama.model);
            Ok(Box::new(OllamaProvider::new(&ollama.endpoint, model)))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

pub fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

// OpenRouter provider
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    site_url: String,
    site_name: String,
    model: String,
}

impl OpenRouterProvider {
    pub fn new(config: &crate::config::OpenRouterConfig, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            site_url: config.site_url.clone(),
            site_name: config.site_name.clone(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn complete(&self, messages: &[ChatMessage], _temperature: f32) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        debug!("OpenRouter request: {}", serde_json::to_string(&body)?);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.site_name)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!("OpenRouter raw response: {}", body_preview(&text));

        if !status.is_success() {
            anyhow::bail!("OpenRouter HTTP {}: {}", status, body_preview(&text));
        }

        let response_body: Value = serde_json::from_str(&text)?;

        if let Some(error) = response_body.get("error") {
            anyhow::bail!("OpenRouter API error: {}", error);
        }

        response_body["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unexpected OpenRouter response structure: {}",
                    body_preview(&text)
                )
            })
    }
}

// Ollama provider (local models)
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        // The generate endpoint takes a single prompt, so only the last
        // message survives the trip.
        let prompt = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "temperature": temperature,
            "stream": false,
        });

        debug!("Ollama request: {}", serde_json::to_string(&body)?);

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!("Ollama raw response: {}", body_preview(&text));

        if !status.is_success() {
            anyhow::bail!("Ollama HTTP {}: {}", status, body_preview(&text));
        }

        let response_body: Value = serde_json::from_str(&text)?;

        response_body["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unexpected Ollama response structure: {}",
                    body_preview(&text)
                )
            })
    }
}
