// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::sandbox::{Sandbox, SandboxError};
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Run a shell command inside the sandbox.
///
/// The per-call timeout is the tool's own concern; the child process is
/// killed when it elapses or when the surrounding task is cancelled.
pub struct RunCommandTool {
    sandbox: Arc<Sandbox>,
    timeout: Duration,
}

impl RunCommandTool {
    pub fn new(sandbox: Arc<Sandbox>, timeout: Duration) -> Self {
        Self { sandbox, timeout }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command inside the sandbox and return its output. \
         Long-running commands are killed when the timeout elapses."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Working directory relative to the sandbox root (optional)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(command) = call.str_arg("command") else {
            return ToolOutput::err(&call.id, "missing 'command'");
        };
        debug!(command, "run_command tool");

        match self
            .sandbox
            .exec(command, self.timeout, call.str_arg("working_dir"))
            .await
        {
            Ok(result) => {
                let mut content = String::new();
                if result.exit_code != 0 {
                    content.push_str(&format!("[exit code {}]\n", result.exit_code));
                }
                content.push_str(&result.stdout);
                if !result.stderr.is_empty() {
                    content.push_str("\n[stderr]\n");
                    content.push_str(&result.stderr);
                }
                ToolOutput::ok(&call.id, content)
            }
            Err(SandboxError::Timeout(d)) => {
                ToolOutput::err(&call.id, format!("command timed out after {d:?}"))
            }
            Err(e) => ToolOutput::err(&call.id, e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> (tempfile::TempDir, RunCommandTool) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::new(dir.path()).unwrap());
        (dir, RunCommandTool::new(sandbox, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn command_output_is_returned() {
        let (_dir, tool) = tool();
        let out = tool
            .execute(&ToolCall::new("1", "run_command", json!({"command": "echo hi"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content.trim(), "hi");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_in_content() {
        let (_dir, tool) = tool();
        let out = tool
            .execute(&ToolCall::new("1", "run_command", json!({"command": "exit 7"})))
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("[exit code 7]"));
    }

    #[tokio::test]
    async fn stderr_is_labelled() {
        let (_dir, tool) = tool();
        let out = tool
            .execute(&ToolCall::new(
                "1",
                "run_command",
                json!({"command": "echo warn >&2"}),
            ))
            .await;
        assert!(out.content.contains("[stderr]"));
        assert!(out.content.contains("warn"));
    }

    #[tokio::test]
    async fn timeout_is_a_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::new(dir.path()).unwrap());
        let tool = RunCommandTool::new(sandbox, Duration::from_millis(50));
        let out = tool
            .execute(&ToolCall::new("1", "run_command", json!({"command": "sleep 5"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("timed out"));
    }

    #[tokio::test]
    async fn missing_command_is_a_tool_error() {
        let (_dir, tool) = tool();
        let out = tool
            .execute(&ToolCall::new("1", "run_command", json!({})))
            .await;
        assert!(out.is_error);
    }
}
