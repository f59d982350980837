//! Field Extractor: structured key/value extraction from generated text.
//!
//! The model's free-form output is re-submitted with a fixed two-field tool
//! schema (`fit_to_spec`); the model responds with one tool call per field
//! instance. Duplicate keys are expected -- that is how multiple variations
//! of the same field surface before grouping -- and are all retained in
//! order. Embedded newlines in values are preserved verbatim.

use crate::backend::{LlmConfig, LlmRequest, ToolCall, ToolSpec};
use serde::Deserialize;
use serde_json::json;

/// One extracted field instance. Newlines in `value` are preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// Field name as the model reported it.
    pub key: String,
    /// The field text, possibly multi-line.
    pub value: String,
}

/// Name of the extraction tool.
pub const TOOL_NAME: &str = "fit_to_spec";

/// The fixed extraction tool schema: exactly two required string fields.
pub fn fit_to_spec_tool() -> ToolSpec {
    ToolSpec::function(
        TOOL_NAME,
        "Extract one named text field from generated marketing copy. \
         Call once per field instance, including repeated fields. \
         Preserve line breaks in the value exactly.",
        json!({
            "type": "object",
            "properties": {
                "key": {
                    "type": "string",
                    "description": "The field name, e.g. Title or Subtitle"
                },
                "value": {
                    "type": "string",
                    "description": "The field text, verbatim, line breaks preserved"
                }
            },
            "required": ["key", "value"]
        }),
    )
}

/// Build the extraction request: the generated text goes in as the user
/// message; the tool schema carries the extraction instructions.
pub fn extraction_request(model: &str, generated_text: &str, config: LlmConfig) -> LlmRequest {
    LlmRequest {
        model: model.to_string(),
        system_prompt: None,
        prompt: generated_text.to_string(),
        messages: Vec::new(),
        config,
    }
}

#[derive(Deserialize)]
struct FitArgs {
    key: String,
    value: String,
}

/// Convert a batch of tool calls into ordered key/value pairs.
///
/// Calls for other tools and calls with malformed arguments are skipped
/// individually. An empty batch yields an empty sequence, never an error:
/// the caller treats it as "all fields missing".
pub fn pairs_from_tool_calls(calls: &[ToolCall]) -> Vec<KeyValue> {
    calls
        .iter()
        .filter(|c| c.name == TOOL_NAME)
        .filter_map(|c| serde_json::from_str::<FitArgs>(&c.arguments).ok())
        .map(|args| KeyValue {
            key: args.key,
            value: args.value,
        })
        .collect()
}
