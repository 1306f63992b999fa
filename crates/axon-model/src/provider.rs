// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{Completion, CompletionRequest, ProviderError, ResponseEvent};

pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<ResponseEvent, ProviderError>> + Send>>;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display and logs.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    ///
    /// The stream ends with [`ResponseEvent::Done`] on success; transport
    /// failures mid-stream surface as an `Err` item and terminate it.
    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError>;

    /// Non-streaming completion.  Used for conversation summarisation, where
    /// the caller only needs the final text.
    async fn create(&self, req: CompletionRequest) -> Result<Completion, ProviderError>;

    /// Offline token estimate for a request.
    ///
    /// The default implementation uses the 4-chars-per-token heuristic over
    /// messages, system prompt and tool schemas.  Providers with a real
    /// counting endpoint may override.
    fn count_tokens(&self, req: &CompletionRequest) -> usize {
        let message_tokens: usize = req.messages.iter().map(|m| m.approx_tokens()).sum();
        let schema_tokens: usize = req
            .tools
            .iter()
            .map(|t| (t.name.len() + t.description.len() + t.parameters.to_string().len()) / 4)
            .sum();
        message_tokens + req.system.len() / 4 + schema_tokens
    }
}
