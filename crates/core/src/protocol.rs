//! Tool-call protocol codec.
//!
//! The model requests skills by embedding JSON objects between `<tool>` and
//! `</tool>` anywhere in its answer:
//!
//! ```text
//! Let me look that up.
//! <tool>{"function": "search", "context": {"query": "weather in New York"}, "abort_on_error": true}</tool>
//! ```
//!
//! Regions are matched non-greedily and never overlap. A single malformed
//! region fails the whole parse.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;

pub const TOOL_OPEN: &str = "<tool>";
pub const TOOL_CLOSE: &str = "</tool>";

/// Emitted by the model to end an autonomous loop.
pub const LOOP_END_MARKER: &str = "<loop_end/>";

/// A parsed, model-requested call to a skill.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolInvocation {
    /// Skill name
    pub function: String,

    /// Argument payload, passed through to the skill
    #[serde(default)]
    pub context: Value,

    /// Skip the rest of the batch if this call fails
    #[serde(default)]
    pub abort_on_error: bool,
}

/// Extract every tool invocation from `text`, in source order.
pub fn parse_tool_calls(text: &str) -> Result<Vec<ToolInvocation>, ProtocolError> {
    tool_regions(text)
        .enumerate()
        .map(|(index, inner)| decode_region(index, inner))
        .collect()
}

/// True iff the loop-termination marker appears anywhere in `text`.
pub fn detect_loop_end(text: &str) -> bool {
    text.contains(LOOP_END_MARKER)
}

/// Inner text of each `<tool>...</tool>` region. An open tag without a
/// matching close tag is not a region.
fn tool_regions(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let start = rest.find(TOOL_OPEN)? + TOOL_OPEN.len();
        let len = rest[start..].find(TOOL_CLOSE)?;
        let inner = &rest[start..start + len];
        rest = &rest[start + len + TOOL_CLOSE.len()..];
        Some(inner)
    })
}

fn decode_region(index: usize, inner: &str) -> Result<ToolInvocation, ProtocolError> {
    let malformed = |reason: String| ProtocolError::MalformedToolCall { index, reason };

    let value: Value = serde_json::from_str(inner.trim()).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("expected a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}
