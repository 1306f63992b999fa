// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use axon_config::AgentConfig;
use axon_model::ModelProvider;
use axon_tools::{Tool, ToolCall, ToolOutput, ToolRegistry};

use crate::agent::{Agent, UserInput};
use crate::events::AgentEvent;
use crate::prompts::SUBAGENT_SYSTEM_PROMPT;

/// The `create_subagent` tool: spawns a child agent with an isolated
/// conversation so exploratory tool traffic does not pollute the parent's
/// context.
///
/// The child shares the parent's provider and tool set — minus
/// `create_subagent` itself, which bounds recursion at depth one — and gets
/// no event store or token counter of its own.
pub struct SubagentTool {
    provider: Arc<dyn ModelProvider>,
    config: Arc<AgentConfig>,
    /// Set after the owning registry is built; `Weak` because the registry
    /// holds this tool.
    registry: OnceLock<Weak<ToolRegistry>>,
}

impl SubagentTool {
    pub fn new(provider: Arc<dyn ModelProvider>, config: Arc<AgentConfig>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            config,
            registry: OnceLock::new(),
        })
    }

    /// Bind the registry this tool was registered into.  Must be called once
    /// after the registry is wrapped in an `Arc`; execution fails cleanly
    /// until then.
    pub fn bind(&self, registry: &Arc<ToolRegistry>) {
        let _ = self.registry.set(Arc::downgrade(registry));
    }

    fn parent_registry(&self) -> Option<Arc<ToolRegistry>> {
        self.registry.get().and_then(Weak::upgrade)
    }
}

#[async_trait]
impl Tool for SubagentTool {
    fn name(&self) -> &str {
        "create_subagent"
    }

    fn description(&self) -> &str {
        "Spawn a subagent with a fresh conversation to complete a bounded task and return \
         its final answer. Useful for exploration whose intermediate tool output should not \
         consume the main context. The subagent has the same tools except create_subagent."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Complete task description for the subagent"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(task) = call.str_arg("task") else {
            return ToolOutput::err(&call.id, "missing 'task'");
        };
        let Some(registry) = self.parent_registry() else {
            return ToolOutput::err(&call.id, "subagent tool is not bound to a registry");
        };

        debug!(task_len = task.len(), "spawning subagent");

        let child_tools = Arc::new(registry.clone_excluding(&[self.name()]));
        let child_config = Arc::new(AgentConfig {
            system_prompt: SUBAGENT_SYSTEM_PROMPT.to_string(),
            ..(*self.config).clone()
        });
        let mut child = Agent::new(child_config, self.provider.clone(), child_tools);

        let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
        let drain = async move {
            let mut text = String::new();
            while let Some(event) = rx.recv().await {
                if let AgentEvent::TextDelta(delta) = event {
                    text.push_str(&delta);
                }
            }
            text
        };

        let (result, text) = tokio::join!(child.stream_message(UserInput::text(task), tx), drain);

        match result {
            Ok(()) if text.is_empty() => {
                ToolOutput::ok(&call.id, "(subagent produced no text output)")
            }
            Ok(()) => ToolOutput::ok(&call.id, text),
            Err(e) => ToolOutput::err(&call.id, format!("subagent error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
