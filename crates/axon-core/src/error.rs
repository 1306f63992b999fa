// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use crate::input::InputError;
use axon_model::ProviderError;

/// Fatal conditions surfaced from [`crate::Agent::stream_message`].
///
/// Recoverable conditions (tool failures, retries, the iteration cap) flow
/// as structured events instead; after any error here the conversation is
/// left in a well-formed state so the caller may simply call again.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Input(#[from] InputError),
}
