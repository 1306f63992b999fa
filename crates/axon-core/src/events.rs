// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::{json, Value};

/// Events emitted by the agent during one `stream_message` call.
///
/// Consumers receive these through the channel passed to the agent; when a
/// stream id is supplied they are also appended to the event store so a
/// disconnected client can resume.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A fragment of assistant prose streamed from the model
    TextDelta(String),
    /// A tool call is about to run
    ToolCallStart {
        id: String,
        name: String,
        input: Value,
    },
    /// A tool call finished
    ToolCallEnd {
        id: String,
        name: String,
        output: String,
        is_error: bool,
    },
    /// Compaction is starting
    CompactStart,
    /// Compaction finished; `did_compact` is false when nothing was rewritten
    CompactEnd { did_compact: bool },
    /// Provider-reported usage for the completed assistant turn
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    /// A retryable provider error; the call will be retried after backoff
    Retry {
        attempt: u32,
        kind: String,
        message: String,
    },
    /// A structured error.  Fatal errors re-raise from `stream_message`
    /// after this is emitted; `iteration_cap` is followed by `Done`.
    Error { kind: String, message: String },
    /// The agent finished processing the user turn
    Done,
}

impl AgentEvent {
    /// Event type name as used on the wire (`event:` field of an SSE frame).
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::TextDelta(_) => "text_delta",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallEnd { .. } => "tool_call_end",
            Self::CompactStart => "compact_start",
            Self::CompactEnd { .. } => "compact_end",
            Self::Usage { .. } => "usage",
            Self::Retry { .. } => "retry",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// JSON payload as used on the wire (`data:` field of an SSE frame).
    pub fn payload(&self) -> Value {
        match self {
            Self::TextDelta(text) => json!({ "text": text }),
            Self::ToolCallStart { id, name, input } => {
                json!({ "id": id, "name": name, "input": input })
            }
            Self::ToolCallEnd {
                id,
                name,
                output,
                is_error,
            } => json!({ "id": id, "name": name, "output": output, "is_error": is_error }),
            Self::CompactStart => json!({}),
            Self::CompactEnd { did_compact } => json!({ "did_compact": did_compact }),
            Self::Usage {
                input_tokens,
                output_tokens,
            } => json!({ "input_tokens": input_tokens, "output_tokens": output_tokens }),
            Self::Retry {
                attempt,
                kind,
                message,
            } => json!({ "attempt": attempt, "kind": kind, "message": message }),
            Self::Error { kind, message } => json!({ "kind": kind, "message": message }),
            Self::Done => json!({}),
        }
    }

    /// Serialize to the `{id, event, data}` wire form used by SSE front-ends.
    pub fn to_wire(&self, id: u64) -> Value {
        json!({ "id": id, "event": self.wire_name(), "data": self.payload() })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
