// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::sandbox::{Sandbox, SandboxError};
use crate::tool::{Tool, ToolCall, ToolOutput};

/// File-backed key/value memory for the agent.
///
/// Keys are file names under a dedicated root directory; values are file
/// contents.  Every key is path-validated against the root, so the model
/// cannot read or write outside the memory directory.
pub struct MemoryTool {
    sandbox: Sandbox,
}

impl MemoryTool {
    /// Create the tool rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SandboxError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            sandbox: Sandbox::new(root)?,
        })
    }

    async fn view(&self, call: &ToolCall) -> ToolOutput {
        match call.str_arg("key") {
            Some(key) => {
                let path = match self.sandbox.validate_path(key) {
                    Ok(p) => p,
                    Err(e) => return ToolOutput::err(&call.id, e.to_string()),
                };
                match tokio::fs::read_to_string(&path).await {
                    Ok(content) => ToolOutput::ok(&call.id, content),
                    Err(_) => ToolOutput::err(&call.id, format!("no such key: {key}")),
                }
            }
            None => {
                let mut keys = Vec::new();
                let mut entries = match tokio::fs::read_dir(self.sandbox.root()).await {
                    Ok(e) => e,
                    Err(e) => return ToolOutput::err(&call.id, format!("memory list error: {e}")),
                };
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                        keys.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                keys.sort();
                if keys.is_empty() {
                    ToolOutput::ok(&call.id, "(no keys stored)")
                } else {
                    ToolOutput::ok(&call.id, keys.join("\n"))
                }
            }
        }
    }

    async fn write(&self, call: &ToolCall) -> ToolOutput {
        let Some(key) = call.str_arg("key") else {
            return ToolOutput::err(&call.id, "missing 'key' for write");
        };
        let Some(value) = call.str_arg("value") else {
            return ToolOutput::err(&call.id, "missing 'value' for write");
        };
        let path = match self.sandbox.validate_path(key) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutput::err(&call.id, format!("write error: {e}"));
            }
        }
        match tokio::fs::write(&path, value).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("stored {key}")),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }

    async fn delete(&self, call: &ToolCall) -> ToolOutput {
        let Some(key) = call.str_arg("key") else {
            return ToolOutput::err(&call.id, "missing 'key' for delete");
        };
        let path = match self.sandbox.validate_path(key) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        match tokio::fs::remove_file(&path).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("deleted {key}")),
            Err(_) => ToolOutput::err(&call.id, format!("no such key: {key}")),
        }
    }
}

#[async_trait]
impl Tool for MemoryTool {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Persist notes across turns. Operations: view (one key, or all keys when no key is \
         given), write (store a value under a key), delete (remove a key)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["view", "write", "delete"],
                    "description": "Memory operation to perform"
                },
                "key": {
                    "type": "string",
                    "description": "Memory key (optional for view, required otherwise)"
                },
                "value": {
                    "type": "string",
                    "description": "Value to store (required for write)"
                }
            },
            "required": ["operation"]
        })
    }

    fn file_param(&self) -> Option<&str> {
        Some("key")
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(op) = call.str_arg("operation") else {
            return ToolOutput::err(&call.id, "missing 'operation'");
        };
        debug!(op, key = call.str_arg("key"), "memory tool");
        match op {
            "view" => self.view(call).await,
            "write" => self.write(call).await,
            "delete" => self.delete(call).await,
            other => ToolOutput::err(&call.id, format!("unknown operation: {other}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
