//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over LLM providers, translating between
//! normalized [`LlmRequest`]/[`LlmResponse`] types and provider-specific
//! HTTP APIs. It exposes the two calls the repair loop depends on: plain
//! text completion and structured extraction via a function-calling tool.
//!
//! ## Architecture
//!
//! ```text
//! session ──► LlmRequest ──► Backend::complete() ────────► LlmResponse
//!                       ──► Backend::complete_with_tool() ► Vec<ToolCall>
//!                                    │
//!                         ┌──────────┴──────────┐
//!                    OpenAiBackend          MockBackend
//!                 /v1/chat/completions    canned responses
//! ```

pub mod backoff;
pub mod mock;
pub mod openai;

pub use backoff::BackoffConfig;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;

use crate::error::Result;
use crate::CopyfitError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Type alias for the callback invoked before each transport retry.
///
/// Arguments: `(attempt_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, std::time::Duration, &str) + Send)>;

/// Configuration for LLM requests.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }
}

/// A normalized LLM request, provider-agnostic.
///
/// The orchestrator builds this from the assembled prompt; the [`Backend`]
/// translates it into the provider-specific HTTP request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"gpt-4o"`).
    pub model: String,

    /// Optional system prompt prepended to the conversation.
    pub system_prompt: Option<String>,

    /// The user prompt text. Used when `messages` is empty.
    pub prompt: String,

    /// Explicit conversation history. When non-empty, `prompt` is ignored.
    pub messages: Vec<ChatMessage>,

    /// LLM configuration (temperature, max_tokens).
    pub config: LlmConfig,
}

impl LlmRequest {
    /// A single-user-message request with default config.
    pub fn user(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            prompt: prompt.into(),
            messages: Vec::new(),
            config: LlmConfig::default(),
        }
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: String,
}

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) response.
    Assistant,
}

/// A normalized LLM response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, timing, model info).
    /// Stored as raw JSON since each provider returns different fields.
    pub metadata: Option<Value>,
}

/// A function-calling tool definition in OpenAI wire format.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// The function portion of the definition.
    pub function: FunctionSpec,
}

/// The function portion of a [`ToolSpec`].
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    /// Function name the model will call.
    pub name: String,
    /// Natural-language description shown to the model.
    pub description: String,
    /// JSON Schema for the function arguments.
    pub parameters: Value,
}

impl ToolSpec {
    /// Define a function tool.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function",
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// One tool call returned by the model.
///
/// `arguments` is the raw JSON string exactly as the provider returned it;
/// callers parse it themselves so that one malformed call does not poison
/// the rest of the batch.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// The function name the model invoked.
    pub name: String,
    /// The function arguments as a JSON string.
    pub arguments: String,
}

/// Abstraction over LLM providers.
///
/// Implementors translate between the normalized [`LlmRequest`] types and
/// the provider's HTTP API. Two modes are required: plain completion
/// (messages → text) and tool-forced completion (messages + tool schema →
/// tool calls), which the field extractor uses.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a plain text completion.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Execute a completion with a required tool, returning every tool
    /// call the model made, in order.
    async fn complete_with_tool(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
        tool: &ToolSpec,
    ) -> Result<Vec<ToolCall>>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Check whether a [`CopyfitError`] is retryable based on the backoff config.
///
/// Retryable conditions:
/// - [`CopyfitError::HttpError`] with a status in `config.retryable_statuses`
/// - [`CopyfitError::Request`] (connection/transport errors)
pub fn is_retryable(error: &CopyfitError, config: &BackoffConfig) -> bool {
    match error {
        CopyfitError::HttpError { status, .. } => config.retryable_statuses.contains(status),
        CopyfitError::Request(_) => true,
        _ => false,
    }
}

/// Shared backoff loop over a fallible async operation.
///
/// Used by [`with_backoff`] and [`with_backoff_tool`]; not public because
/// the operation closures borrow the request.
async fn backoff_loop<T, F, Fut>(
    config: &BackoffConfig,
    cancel: Option<&std::sync::atomic::AtomicBool>,
    mut on_retry: RetryCallback<'_>,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error: Option<CopyfitError> = None;

    for attempt in 0..=config.max_retries {
        if let Some(flag) = cancel {
            if flag.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(CopyfitError::Cancelled);
            }
        }

        // Wait for backoff delay (not on first attempt)
        if attempt > 0 {
            let delay = if let Some(CopyfitError::HttpError {
                retry_after: Some(ra),
                ..
            }) = &last_error
            {
                if config.respect_retry_after {
                    *ra
                } else {
                    config.delay_for_attempt(attempt - 1)
                }
            } else {
                config.delay_for_attempt(attempt - 1)
            };

            let reason = last_error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();

            if let Some(ref mut cb) = on_retry {
                cb(attempt, delay, &reason);
            }

            tokio::time::sleep(delay).await;

            // Check cancellation after sleep
            if let Some(flag) = cancel {
                if flag.load(std::sync::atomic::Ordering::Relaxed) {
                    return Err(CopyfitError::Cancelled);
                }
            }
        }

        match op().await {
            Ok(response) => return Ok(response),
            Err(e) => {
                if attempt < config.max_retries && is_retryable(&e, config) {
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    Err(last_error.unwrap_or(CopyfitError::Other(
        "backoff loop exited unexpectedly".into(),
    )))
}

/// Execute a backend completion with transport-level retry and exponential
/// backoff.
///
/// Wraps [`Backend::complete`] with automatic retry on transient failures
/// (429, 5xx, connection errors). Returns the first successful response,
/// or the last error if all retries are exhausted.
pub async fn with_backoff(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &LlmRequest,
    config: &BackoffConfig,
    cancel: Option<&std::sync::atomic::AtomicBool>,
    on_retry: RetryCallback<'_>,
) -> Result<LlmResponse> {
    backoff_loop(config, cancel, on_retry, || {
        backend.complete(client, base_url, request)
    })
    .await
}

/// Execute a tool-forced backend call with transport-level retry.
///
/// Same policy as [`with_backoff`] but for [`Backend::complete_with_tool`].
pub async fn with_backoff_tool(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &LlmRequest,
    tool: &ToolSpec,
    config: &BackoffConfig,
    cancel: Option<&std::sync::atomic::AtomicBool>,
    on_retry: RetryCallback<'_>,
) -> Result<Vec<ToolCall>> {
    backoff_loop(config, cancel, on_retry, || {
        backend.complete_with_tool(client, base_url, request, tool)
    })
    .await
}
