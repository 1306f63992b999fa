// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! The axon agent core: a library-embeddable streaming tool-use loop with
//! conversation compaction, a resumable event stream, a two-phase skill
//! catalogue, and subagent spawning.
//!
//! An embedder constructs an [`Agent`] from a config, a
//! [`axon_model::ModelProvider`], and an [`axon_tools::ToolRegistry`], then
//! calls [`Agent::stream_message`] per user turn and consumes
//! [`AgentEvent`]s from the channel it supplied.

mod agent;
mod compact;
mod conversation;
mod error;
mod events;
mod input;
mod prompts;
mod skills;
mod store;
mod subagent;

pub use agent::{Agent, UserInput};
pub use compact::{
    safe_split_point, truncate_old_tool_results, CompactOutcome, Compactor, COMPACTED_SENTINEL,
};
pub use conversation::{Conversation, TokenCounter};
pub use error::AgentError;
pub use events::AgentEvent;
pub use input::{Attachment, InputError};
pub use prompts::{render_system_prompt, SUBAGENT_SYSTEM_PROMPT};
pub use skills::{Skill, SkillError, SkillRegistry};
pub use store::{EventStore, EventStoreError, StoredEvent, StreamStatus};
pub use subagent::SubagentTool;
