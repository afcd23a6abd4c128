use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// URL of the middleman proxy the bridge posts chat jobs to
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Upper bound on a single provider round trip
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openrouter: Option<OpenRouterConfig>,

    #[serde(default)]
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    pub api_key: String,

    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    /// Sent as HTTP-Referer for OpenRouter site attribution
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Sent as X-Title for OpenRouter site attribution
    #[serde(default = "default_site_name")]
    pub site_name: String,

    #[serde(default = "default_openrouter_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_proxy_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_temperature() -> f32 {
    0.7
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_site_url() -> String {
    "http://localhost".to_string()
}

fn default_site_name() -> String {
    "llm-bridge".to_string()
}

fn default_openrouter_model() -> String {
    "meta-llama/llama-3.1-70b-instruct:free".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_proxy_url(),
            request_timeout_secs: default_request_timeout(),
            default_temperature: default_temperature(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load config from the given path, `LLM_BRIDGE_CONFIG`, or
    /// `llm-bridge.toml` in the working directory. A missing file yields
    /// the defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = match path {
            Some(p) => PathBuf::from(p),
            None => std::env::var("LLM_BRIDGE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("llm-bridge.toml")),
        };

        if !path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.expand_env_vars();
        Ok(config)
    }

    fn expand_env_vars(&mut self) {
        if let Some(ref mut openrouter) = self.providers.openrouter {
            openrouter.api_key = expand_env(&openrouter.api_key);
        }
    }
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else {
        s.to_string()
    }
}
