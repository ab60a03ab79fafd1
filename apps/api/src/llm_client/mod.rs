//! LLM Client: the single point of entry for all chat-completion calls.
//!
//! ARCHITECTURAL RULE: No other module may call the LLM backend directly.
//! The review service talks to it through the `ChatBackend` trait.
//!
//! Shape mismatches in a successful reply never fail here. Only transport and
//! HTTP-status failures become errors; the caller owns reply parsing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

/// Placeholder used when a failed response carries no readable body.
const NO_BODY: &str = "No body";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to build LLM request: {0}")]
    Build(#[source] serde_json::Error),

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM backend returned status {status}: {body}")]
    Backend { status: u16, body: String },
}

impl LlmError {
    /// True when the backend answered 429 Too Many Requests.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::Backend { status: 429, .. })
    }
}

/// Anything that can turn a prompt into assistant text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, model: &str, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

/// Chat-completion client. Cheap to clone; the URL and credential are fixed
/// at construction and shared read-only by every request.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
        })
    }

    /// Sends `prompt` as a single user message and returns the assistant text.
    pub async fn send_prompt(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let payload = serde_json::to_vec(&request_body).map_err(|e| {
            error!("Error building request to LLM backend: {e}");
            LlmError::Build(e)
        })?;

        debug!("Calling LLM backend (model: {model}, prompt length: {})", prompt.len());

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                error!("Error calling LLM backend: {e}");
                LlmError::Transport(e)
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) if !body.trim().is_empty() => body,
                _ => NO_BODY.to_string(),
            };
            error!("LLM backend returned status {}: {}", status.as_u16(), body);
            return Err(LlmError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.bytes().await?;
        let text = extract_reply(&raw);

        debug!("LLM response content length: {}", text.len());
        Ok(text)
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn send(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        self.send_prompt(model, prompt).await
    }
}

/// Pulls the assistant text out of a successful response body.
///
/// Falls back to the whole body as text whenever the expected shape is
/// missing, so the caller always has something to audit.
fn extract_reply(raw: &[u8]) -> String {
    let value: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!("LLM response body is not JSON ({e}), returning it verbatim");
            return std::str::from_utf8(raw).map(str::to_string).unwrap_or_default();
        }
    };

    if value.is_null() {
        return String::new();
    }

    log_usage(&value);

    let content = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str);

    match content {
        Some(content) => content.to_string(),
        None => {
            debug!("choices[0].message.content not found, returning raw JSON");
            serde_json::to_string(&value).unwrap_or_default()
        }
    }
}

/// Token usage is informational only and never affects the reply.
fn log_usage(value: &Value) {
    let usage = value
        .get("usage")
        .and_then(|usage| Usage::deserialize(usage).ok());

    if let Some(usage) = usage {
        debug!(
            "LLM call succeeded: prompt_tokens={:?}, completion_tokens={:?}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }
}
