//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] returns pre-configured responses in order, allowing
//! downstream consumers to write deterministic tests against this crate.
//! Text completions and tool-call batches are configured separately since
//! the repair loop interleaves the two.
//!
//! # Example
//!
//! ```
//! use copyfit::backend::MockBackend;
//!
//! let mock = MockBackend::new(vec!["Header: Hello".to_string()]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse, ToolCall, ToolSpec};
use crate::error::Result;

/// A test backend that returns canned responses in order.
///
/// Cycles back to the beginning when all responses of a kind have been
/// consumed. Tool calls come from a separate queue of batches; with no
/// batches configured, `complete_with_tool` returns an empty batch, which
/// exercises the empty-extraction path downstream.
#[derive(Debug)]
pub struct MockBackend {
    responses: Vec<String>,
    tool_batches: Vec<Vec<ToolCall>>,
    text_index: AtomicUsize,
    tool_index: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend with the given canned text responses.
    ///
    /// Responses are returned in order. When exhausted, cycles from the beginning.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(
            !responses.is_empty(),
            "MockBackend requires at least one response"
        );
        Self {
            responses,
            tool_batches: Vec::new(),
            text_index: AtomicUsize::new(0),
            tool_index: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always returns the same text response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Add canned tool-call batches, returned in order by
    /// [`Backend::complete_with_tool`]. Cycles when exhausted.
    pub fn with_tool_batches(mut self, batches: Vec<Vec<ToolCall>>) -> Self {
        self.tool_batches = batches;
        self
    }

    /// Number of text completions served so far.
    pub fn completions_served(&self) -> usize {
        self.text_index.load(Ordering::Relaxed)
    }

    /// Number of tool-call batches served so far.
    pub fn tool_batches_served(&self) -> usize {
        self.tool_index.load(Ordering::Relaxed)
    }

    fn next_response(&self) -> String {
        let idx = self.text_index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        self.responses[idx].clone()
    }

    fn next_tool_batch(&self) -> Vec<ToolCall> {
        if self.tool_batches.is_empty() {
            self.tool_index.fetch_add(1, Ordering::Relaxed);
            return Vec::new();
        }
        let idx = self.tool_index.fetch_add(1, Ordering::Relaxed) % self.tool_batches.len();
        self.tool_batches[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let text = self.next_response();
        Ok(LlmResponse {
            text,
            status: 200,
            metadata: Default::default(),
        })
    }

    async fn complete_with_tool(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &LlmRequest,
        _tool: &ToolSpec,
    ) -> Result<Vec<ToolCall>> {
        Ok(self.next_tool_batch())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Build a `fit_to_spec` tool call from a key/value pair. Test helper.
pub fn tool_call(key: &str, value: &str) -> ToolCall {
    ToolCall {
        name: "fit_to_spec".to_string(),
        arguments: serde_json::json!({"key": key, "value": value}).to_string(),
    }
}
