// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so fields that should be enabled unless explicitly
/// disabled need a named function.
fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "claude-sonnet-4-5".into()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_context_window() -> usize {
    200_000
}

fn default_max_tool_iterations() -> u32 {
    25
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    1000
}

fn default_compact_threshold() -> f32 {
    0.80
}

fn default_compact_protect_last_k() -> usize {
    3
}

fn default_max_inline_bytes() -> usize {
    30 * 1024
}

fn default_page_bytes() -> usize {
    8 * 1024
}

fn default_event_store_ttl_secs() -> u64 {
    600
}

fn default_tool_timeout_secs() -> u64 {
    120
}

/// Runtime configuration for one agent instance.
///
/// Every field has a serde default so embedders can deserialize a partial
/// document (or use [`AgentConfig::default`]) and override only what they
/// need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model identifier forwarded to the provider API.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens the model may generate in a single response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Context window budget used for compaction decisions.  The token
    /// counter's usage fraction is computed against this value.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Safety cap on model → tool → model rounds within one user turn.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Ask the provider to cache the system-prompt prefix between calls.
    #[serde(default = "default_true")]
    pub enable_prompt_caching: bool,

    /// Maximum retries for retryable provider errors (rate limit, 5xx,
    /// network, timeout).  Non-retryable errors fail immediately.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds; doubles per attempt with jitter.
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    /// Base system prompt.  Skill injections are appended to it on every turn.
    #[serde(default)]
    pub system_prompt: String,

    /// Usage fraction of the context window at which compaction triggers.
    #[serde(default = "default_compact_threshold")]
    pub compact_threshold: f32,

    /// Number of most-recent user/assistant turn pairs that compaction must
    /// preserve byte-identical.
    #[serde(default = "default_compact_protect_last_k")]
    pub compact_protect_last_k: usize,

    /// Tool results longer than this are stored externally and paginated.
    #[serde(default = "default_max_inline_bytes")]
    pub max_inline_bytes: usize,

    /// Page size for externally stored oversized tool results.
    #[serde(default = "default_page_bytes")]
    pub page_bytes: usize,

    /// Seconds of inactivity after which an event-store stream is evicted.
    #[serde(default = "default_event_store_ttl_secs")]
    pub event_store_ttl_secs: u64,

    /// Wallclock limit for sandboxed command execution.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        // Round-trips through an empty document so the serde defaults are the
        // single source of truth.
        serde_json::from_str("{}").expect("empty config must deserialize")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
