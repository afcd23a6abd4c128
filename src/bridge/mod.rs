//! Bridge between the host scripting environment and the LLM proxy
//!
//! The host calls exported functions synchronously as `[functionName,
//! [args]]` and cannot block on network I/O, so slow requests are started
//! fire-and-forget on a bridge-owned runtime and joined back through the
//! correlation table: the first call with a fresh request id launches the
//! task, later calls with an empty prompt poll for the result.

pub mod correlation;
pub mod sanitize;

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::config::{BridgeConfig, Config};
use crate::providers::{ChatMessage, ChatResponse, body_preview};
use correlation::{CorrelationTable, Poll, RequestRecord};
use sanitize::sanitize;

/// Returned when a start or poll call arrives without a request id
pub const MSG_MISSING_ID: &str = "error: requestId must not be empty";
/// Returned by the call that launched the background task
pub const MSG_STARTED: &str = "request started";
/// Returned while the background task is outstanding, and for a duplicate
/// start on the same id
pub const MSG_PROCESSING: &str = "still processing";
/// Returned when polling an id that was never started or already consumed
pub const MSG_NO_REQUEST: &str = "no request found for this requestId";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
const DEFAULT_PROVIDER: &str = "ollama";

/// One provider round trip, in the shape the proxy accepts
#[derive(Debug, Clone, Serialize)]
pub struct ChatJob {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub temperature: f32,
    pub provider: String,
}

pub struct Bridge {
    config: BridgeConfig,
    table: CorrelationTable,
    client: reqwest::Client,
    // Host calls arrive on whatever thread the engine uses; background
    // tasks need a runtime of their own.
    runtime: tokio::runtime::Runtime,
}

impl Bridge {
    pub fn new(config: &Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("llm-bridge-worker")
            .enable_all()
            .build()
            .context("failed to create bridge runtime")?;

        Ok(Self {
            config: config.bridge.clone(),
            table: CorrelationTable::new(),
            client: reqwest::Client::new(),
            runtime,
        })
    }

    pub fn table(&self) -> &CorrelationTable {
        &self.table
    }

    /// Dispatch a host call `[functionName, [args]]` given as JSON text.
    pub fn dispatch_call(&self, call: &str) -> Value {
        match serde_json::from_str::<(String, Vec<Value>)>(call) {
            Ok((name, args)) => self.dispatch(&name, &args),
            Err(e) => json!(format!("error: invalid call format: {e}")),
        }
    }

    /// Dispatch one exported function by name. Unknown names and malformed
    /// arguments come back as error strings, never as a panic into the
    /// host engine.
    pub fn dispatch(&self, name: &str, args: &[Value]) -> Value {
        debug!("dispatch {name} with {} args", args.len());

        let str_arg = |i: usize| args.get(i).and_then(Value::as_str).unwrap_or("");

        match name {
            "hello" => json!("Hello world!"),
            "ping" => Value::Array(args.to_vec()),
            "fibonacci" => match args.first().and_then(Value::as_u64) {
                Some(n) => json!(fibonacci(n)),
                None => json!("error: fibonacci expects a non-negative integer"),
            },
            "prompt" => {
                json!(self.prompt(str_arg(0), str_arg(1), str_arg(2), str_arg(3)))
            }
            "chat_with_ai" => {
                let temperature = args
                    .get(1)
                    .and_then(Value::as_f64)
                    .map(|t| t as f32)
                    .unwrap_or(self.config.default_temperature);
                json!(self.chat_with_ai(str_arg(0), temperature, str_arg(2), str_arg(3)))
            }
            other => json!(format!("error: unknown function: {other}")),
        }
    }

    /// System-plus-user call shape. An empty `user_prompt` polls the id
    /// instead of starting a request.
    pub fn prompt(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        provider: &str,
        request_id: &str,
    ) -> String {
        let job = (!user_prompt.is_empty()).then(|| {
            let system = if system_prompt.is_empty() {
                DEFAULT_SYSTEM_PROMPT
            } else {
                system_prompt
            };
            ChatJob {
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: system.to_string(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: user_prompt.to_string(),
                    },
                ],
                model: None,
                temperature: self.config.default_temperature,
                provider: provider_or_default(provider),
            }
        });
        self.correlate(request_id, job)
    }

    /// Single-message call shape with an explicit temperature.
    pub fn chat_with_ai(
        &self,
        prompt: &str,
        temperature: f32,
        provider: &str,
        request_id: &str,
    ) -> String {
        let job = (!prompt.is_empty()).then(|| ChatJob {
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            model: None,
            temperature,
            provider: provider_or_default(provider),
        });
        self.correlate(request_id, job)
    }

    /// The shared start-or-poll state machine. `job` is Some for a start
    /// attempt and None for a poll.
    fn correlate(&self, request_id: &str, job: Option<ChatJob>) -> String {
        if request_id.is_empty() {
            return MSG_MISSING_ID.to_string();
        }

        match job {
            Some(job) => {
                if !self.table.try_begin(request_id) {
                    // A task for this id is outstanding or unconsumed.
                    return MSG_PROCESSING.to_string();
                }
                self.spawn_job(request_id.to_string(), job);
                MSG_STARTED.to_string()
            }
            None => match self.table.poll_take(request_id) {
                Poll::Missing => MSG_NO_REQUEST.to_string(),
                Poll::Pending => MSG_PROCESSING.to_string(),
                Poll::Finished(record) => record.payload,
            },
        }
    }

    fn spawn_job(&self, request_id: String, job: ChatJob) {
        let table = self.table.clone();
        let client = self.client.clone();
        let url = format!("{}/chat", self.config.proxy_url);
        let timeout = Duration::from_secs(self.config.request_timeout_secs);

        self.runtime.spawn(async move {
            let record = match tokio::time::timeout(timeout, run_job(&client, &url, &job)).await {
                Ok(Ok(text)) => RequestRecord::success(sanitize(&text)),
                Ok(Err(e)) => {
                    error!("request {request_id} failed: {e:#}");
                    RequestRecord::error(sanitize(&format!("request error: {e}")))
                }
                Err(_) => {
                    error!(
                        "request {request_id} timed out after {}s",
                        timeout.as_secs()
                    );
                    RequestRecord::error("request timed out".to_string())
                }
            };
            table.complete(&request_id, record);
        });
    }
}

async fn run_job(client: &reqwest::Client, url: &str, job: &ChatJob) -> Result<String> {
    let response = client.post(url).json(job).send().await?;

    let status = response.status();
    let text = response.text().await?;
    debug!("proxy raw response: {}", body_preview(&text));

    if !status.is_success() {
        anyhow::bail!("proxy HTTP {}: {}", status, body_preview(&text));
    }

    let parsed: ChatResponse = serde_json::from_str(&text)
        .with_context(|| format!("unexpected proxy response: {}", body_preview(&text)))?;
    Ok(parsed.response)
}

fn provider_or_default(provider: &str) -> String {
    if provider.is_empty() {
        DEFAULT_PROVIDER.to_string()
    } else {
        provider.to_string()
    }
}

fn fibonacci(n: u64) -> u64 {
    if n < 2 {
        n
    } else {
        fibonacci(n - 2) + fibonacci(n - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bridge() -> Bridge {
        let mut config = Config::default();
        // Nothing listens here; background tasks fail fast, which is fine
        // for tests that only exercise the synchronous contract.
        config.bridge.proxy_url = "http://127.0.0.1:9".to_string();
        Bridge::new(&config).unwrap()
    }

    #[test]
    fn test_fibonacci_values() {
        assert_eq!(fibonacci(0), 0);
        assert_eq!(fibonacci(1), 1);
        assert_eq!(fibonacci(10), 55);
    }

    #[test]
    fn test_dispatch_hello() {
        let bridge = test_bridge();
        assert_eq!(bridge.dispatch("hello", &[]), json!("Hello world!"));
    }

    #[test]
    fn test_dispatch_ping_echoes_args() {
        let bridge = test_bridge();
        let args = [json!("string"), json!(1), json!(2.3), json!(true)];
        assert_eq!(bridge.dispatch("ping", &args), json!(["string", 1, 2.3, true]));
    }

    #[test]
    fn test_dispatch_fibonacci() {
        let bridge = test_bridge();
        assert_eq!(bridge.dispatch("fibonacci", &[json!(10)]), json!(55));
    }

    #[test]
    fn test_dispatch_fibonacci_bad_arg() {
        let bridge = test_bridge();
        let out = bridge.dispatch("fibonacci", &[json!("ten")]);
        assert!(out.as_str().unwrap().starts_with("error:"));
    }

    #[test]
    fn test_dispatch_unknown_function() {
        let bridge = test_bridge();
        let out = bridge.dispatch("teleport", &[]);
        assert_eq!(out, json!("error: unknown function: teleport"));
    }

    #[test]
    fn test_dispatch_call_format() {
        let bridge = test_bridge();
        assert_eq!(
            bridge.dispatch_call(r#"["fibonacci", [10]]"#),
            json!(55)
        );
        let bad = bridge.dispatch_call("not json");
        assert!(bad.as_str().unwrap().starts_with("error: invalid call format"));
    }

    #[test]
    fn test_prompt_rejects_empty_request_id() {
        let bridge = test_bridge();
        let out = bridge.prompt("system", "user", "ollama", "");
        assert_eq!(out, MSG_MISSING_ID);
        assert!(bridge.table().is_empty());
    }

    #[test]
    fn test_poll_before_start_is_fallback_not_error() {
        let bridge = test_bridge();
        let out = bridge.prompt("", "", "ollama", "never-started");
        assert_eq!(out, MSG_NO_REQUEST);
    }

    #[test]
    fn test_start_then_duplicate_start() {
        let bridge = test_bridge();
        let first = bridge.prompt("sys", "make a patrol route", "ollama", "req-1");
        assert_eq!(first, MSG_STARTED);

        let second = bridge.prompt("sys", "make a patrol route", "ollama", "req-1");
        assert_eq!(second, MSG_PROCESSING);
        assert_eq!(bridge.table().len(), 1);
    }

    #[test]
    fn test_chat_with_ai_start_does_not_block() {
        let bridge = test_bridge();
        let started = std::time::Instant::now();
        let out = bridge.chat_with_ai("hello there", 0.7, "ollama", "req-chat");
        assert_eq!(out, MSG_STARTED);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
