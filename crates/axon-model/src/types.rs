// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Content blocks ───────────────────────────────────────────────────────────

/// One content block inside a conversation message.
///
/// The discriminated-union form mirrors the provider wire format so the
/// conversation can be serialized at the provider boundary without an
/// intermediate representation.  `ToolUse` appears only in assistant turns;
/// `ToolResult`, `Image` and `Document` only in user turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        /// Opaque identifier assigned by the model; the matching tool result
        /// carries the same id.
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    Image {
        media_type: String,
        /// Base64-encoded payload.
        data: String,
    },
    Document {
        media_type: String,
        /// Base64-encoded payload.
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }
}

// ─── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn in the conversation.  Turns strictly alternate user and
/// assistant; every `tool_use` block in an assistant turn is answered by
/// exactly one `tool_result` block in the immediately following user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn user_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    pub fn assistant_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Concatenated text of all `Text` blocks in this turn.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Ids of all `tool_use` blocks in this turn, in block order.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Ids answered by the `tool_result` blocks in this turn, in block order.
    pub fn tool_result_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Approximate token count used as a fallback estimate for context
    /// budgeting.  Text uses the 4-chars-per-token heuristic; binary blocks
    /// use their base64 length, which over- rather than under-counts.
    pub fn approx_tokens(&self) -> usize {
        let chars: usize = self
            .content
            .iter()
            .map(|b| match b {
                ContentBlock::Text { text } => text.len(),
                ContentBlock::ToolUse { name, input, .. } => name.len() + input.to_string().len(),
                ContentBlock::ToolResult { content, .. } => content.len(),
                ContentBlock::Image { data, .. } => data.len(),
                ContentBlock::Document { data, .. } => data.len(),
            })
            .sum();
        (chars / 4).max(1)
    }
}

// ─── Provider request / response ──────────────────────────────────────────────

/// A tool definition as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: Value,
}

/// Request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub system: String,
    pub tools: Vec<ToolSchema>,
    pub max_tokens: u32,
    /// Hint to providers that support prompt caching: mark the system prompt
    /// prefix cacheable.  Providers without caching ignore it.
    pub cache_system_prompt: bool,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    /// A stop reason this crate does not model explicitly; treated as
    /// terminal by the agent loop.
    Other,
}

/// Token usage reported by the provider for one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A single streamed event from the model.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A text fragment of the assistant's prose.
    TextDelta(String),
    /// A tool invocation request.  `arguments` is a JSON fragment that may
    /// arrive across multiple events for the same `index`; the consumer
    /// accumulates until `Done`.
    ToolUse {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    /// Usage totals; may be emitted incrementally (input first, output last).
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    /// The stream finished.
    Done { stop_reason: StopReason },
}

/// Result of a non-streaming completion (used for compaction summaries).
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_message_has_single_text_block() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.text(), "hello");
    }

    #[test]
    fn text_concatenates_only_text_blocks() {
        let m = Message::assistant_blocks(vec![
            ContentBlock::text("a"),
            ContentBlock::tool_use("t1", "echo", json!({})),
            ContentBlock::text("b"),
        ]);
        assert_eq!(m.text(), "ab");
    }

    #[test]
    fn tool_use_ids_in_block_order() {
        let m = Message::assistant_blocks(vec![
            ContentBlock::tool_use("t1", "a", json!({})),
            ContentBlock::text("thinking"),
            ContentBlock::tool_use("t2", "b", json!({})),
        ]);
        assert_eq!(m.tool_use_ids(), vec!["t1", "t2"]);
    }

    #[test]
    fn tool_result_ids_in_block_order() {
        let m = Message::user_blocks(vec![
            ContentBlock::tool_result("t2", "y", false),
            ContentBlock::tool_result("t1", "x", true),
        ]);
        assert_eq!(m.tool_result_ids(), vec!["t2", "t1"]);
    }

    #[test]
    fn content_block_serializes_with_type_tag() {
        let b = ContentBlock::text("hi");
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn tool_result_is_error_defaults_to_false() {
        let json = r#"{"type":"tool_result","tool_use_id":"t1","content":"ok"}"#;
        let b: ContentBlock = serde_json::from_str(json).unwrap();
        assert_eq!(b, ContentBlock::tool_result("t1", "ok", false));
    }

    #[test]
    fn document_name_omitted_when_none() {
        let b = ContentBlock::Document {
            media_type: "application/pdf".into(),
            data: "QUJD".into(),
            name: None,
        };
        let json = serde_json::to_string(&b).unwrap();
        assert!(!json.contains("\"name\""));
    }

    #[test]
    fn message_round_trips_through_json() {
        let m = Message::assistant_blocks(vec![
            ContentBlock::text("calling"),
            ContentBlock::tool_use("t9", "grep", json!({"pattern": "fn main"})),
        ]);
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn approx_tokens_divides_chars_by_four() {
        let m = Message::user("12345678");
        assert_eq!(m.approx_tokens(), 2);
    }

    #[test]
    fn approx_tokens_minimum_is_one() {
        let m = Message::user("");
        assert_eq!(m.approx_tokens(), 1);
    }
}
