// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Two-phase conversation compaction.
//!
//! Phase 1 truncates old tool results in place — no model call, block
//! identity preserved, pairing untouched.  Phase 2 replaces a safe prefix of
//! the conversation with an LLM-written summary.  Both phases keep the most
//! recent `protect_last_k` user/assistant turn pairs byte-identical and never
//! sever a tool_use/tool_result pair.

use axon_model::{
    CompletionRequest, ContentBlock, Message, ModelProvider, ProviderError, Role,
};
use tracing::debug;

/// Sentinel written into truncated tool results.  Block identity (the
/// `tool_use_id` and `is_error` flag) is preserved so the pairing invariant
/// is untouched.
pub const COMPACTED_SENTINEL: &str = "[compacted tool result]";

const SUMMARIZE_SYSTEM_PROMPT: &str = "\
You are a context compaction assistant. Summarise the conversation history \
below in a concise, information-dense way. Preserve all technical details, \
decisions, file names, identifiers, and tool outputs that may matter for \
future work. The summary will replace the original history to free up \
context space.";

const SUMMARY_REQUEST_TEXT: &str = "Earlier-context summary request";

/// What a compaction pass did to the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactOutcome {
    Unchanged,
    /// Phase 1: this many tool_result blocks were replaced by the sentinel.
    TruncatedToolResults { blocks: usize },
    /// Phase 2: the first `turns` messages were replaced by a summary pair.
    Summarized { turns: usize },
}

impl CompactOutcome {
    pub fn did_compact(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

pub struct Compactor {
    pub threshold: f32,
    pub protect_last_k: usize,
}

impl Compactor {
    pub fn new(threshold: f32, protect_last_k: usize) -> Self {
        Self {
            threshold,
            protect_last_k,
        }
    }

    /// Compact `messages` if `usage_fraction` is at or above the threshold.
    ///
    /// Phase 2 calls the provider; on a provider error the conversation is
    /// left exactly as it was and the error is returned — the caller decides
    /// whether that is fatal.
    pub async fn compact(
        &self,
        messages: &mut Vec<Message>,
        usage_fraction: f32,
        provider: &dyn ModelProvider,
        summary_max_tokens: u32,
    ) -> Result<CompactOutcome, ProviderError> {
        if usage_fraction < self.threshold {
            return Ok(CompactOutcome::Unchanged);
        }

        // Phase 1 — local truncation, no model call.
        let blocks = truncate_old_tool_results(messages, self.protect_last_k);
        if blocks > 0 {
            debug!(blocks, "compaction phase 1 truncated tool results");
            return Ok(CompactOutcome::TruncatedToolResults { blocks });
        }

        // Phase 2 — summarise a safe prefix.
        let Some(split) = safe_split_point(messages, self.protect_last_k) else {
            return Ok(CompactOutcome::Unchanged);
        };

        let history = serialize_history(&messages[..split]);
        let req = CompletionRequest {
            messages: vec![Message::user(history)],
            system: SUMMARIZE_SYSTEM_PROMPT.to_string(),
            max_tokens: summary_max_tokens,
            ..Default::default()
        };
        // Nothing is mutated until the summary exists, so a failure here
        // leaves the conversation intact.
        let completion = provider.create(req).await?;

        let suffix = messages.split_off(split);
        messages.clear();
        messages.push(Message::user(SUMMARY_REQUEST_TEXT));
        messages.push(Message::assistant(completion.text));
        messages.extend(suffix);

        debug!(turns = split, "compaction phase 2 summarised prefix");
        Ok(CompactOutcome::Summarized { turns: split })
    }
}

/// Replace the content of every `tool_result` block outside the protected
/// tail (the last `protect_last_k` user/assistant pairs) with the sentinel.
/// Already-compacted blocks are skipped, so a second pass finds nothing and
/// falls through to Phase 2.  Returns the number of blocks replaced.
pub fn truncate_old_tool_results(messages: &mut [Message], protect_last_k: usize) -> usize {
    let protected_from = messages.len().saturating_sub(2 * protect_last_k);
    let mut replaced = 0;
    for msg in &mut messages[..protected_from] {
        if msg.role != Role::User {
            continue;
        }
        for block in &mut msg.content {
            if let ContentBlock::ToolResult { content, .. } = block {
                if content.as_str() != COMPACTED_SENTINEL {
                    *content = COMPACTED_SENTINEL.to_string();
                    replaced += 1;
                }
            }
        }
    }
    replaced
}

/// The largest index `s` at which the conversation can be bisected safely:
/// `messages[s]` starts a user turn carrying no tool results (so no pair is
/// severed), and the protected tail lies entirely after `s`.  `None` when no
/// such point exists.
pub fn safe_split_point(messages: &[Message], protect_last_k: usize) -> Option<usize> {
    let max_split = messages.len().checked_sub(2 * protect_last_k)?;
    let mut s = max_split;
    while s >= 2 {
        if messages[s].role == Role::User && messages[s].tool_result_ids().is_empty() {
            return Some(s);
        }
        s -= 1;
    }
    None
}

/// Flatten a message prefix into plain text for the summarisation prompt.
fn serialize_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let body = m
                .content
                .iter()
                .map(|b| match b {
                    ContentBlock::Text { text } => text.clone(),
                    ContentBlock::ToolUse { name, input, .. } => {
                        format!("[tool_use: {name}({input})]")
                    }
                    ContentBlock::ToolResult { content, .. } => {
                        format!("[tool_result: {content}]")
                    }
                    ContentBlock::Image { .. } => "[image]".to_string(),
                    ContentBlock::Document { .. } => "[document]".to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            format!("{role}: {body}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
