// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Provider-neutral conversation data model, the [`ModelProvider`] contract,
//! and concrete providers (Anthropic plus deterministic mocks for tests).

mod anthropic;
mod error;
mod mock;
mod provider;
pub mod retry;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;
pub use mock::{text_script, tool_use_script, MockProvider, Script, ScriptedProvider};
pub use provider::{ModelProvider, ResponseStream};
pub use retry::{retry_with_backoff, RetryConfig};
pub use types::{
    Completion, CompletionRequest, ContentBlock, Message, ResponseEvent, Role, StopReason,
    ToolSchema, Usage,
};
