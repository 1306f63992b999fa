// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::builtin::ReadMoreTool;
use crate::locks::FileLocks;
use crate::pager::ResultPager;
use crate::{Tool, ToolCall, ToolOutput};

/// A tool schema in provider-neutral form.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    DuplicateTool(String),
    #[error("invalid tool name {0:?}: must match [A-Za-z0-9_]+")]
    InvalidName(String),
}

/// Central registry holding all tools available to one agent.
///
/// Immutable after startup from the agent's point of view: the agent only
/// reads schemas and dispatches calls.  Subagents get their own instance via
/// [`ToolRegistry::clone_excluding`]; the oversized-result pager and the file
/// locks are shared between parent and clone so paginated results remain
/// retrievable and file writes stay serialised across the whole agent tree.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order; `definitions()` is stable in this order.
    order: Vec<String>,
    pager: Arc<ResultPager>,
    locks: Option<Arc<FileLocks>>,
    max_inline_bytes: usize,
}

impl ToolRegistry {
    /// Create a registry with the given oversized-result thresholds.
    /// The `read_more` retrieval tool is registered from the start.
    pub fn new(max_inline_bytes: usize, page_bytes: usize) -> Self {
        let pager = Arc::new(ResultPager::new(page_bytes));
        let mut reg = Self {
            tools: HashMap::new(),
            order: Vec::new(),
            pager: pager.clone(),
            locks: None,
            max_inline_bytes,
        };
        reg.insert(Arc::new(ReadMoreTool::new(pager)));
        reg
    }

    /// Enable per-file locking for tools that declare a `file_param`.
    pub fn with_lock_provider(mut self, locks: Arc<FileLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Register a tool.  Fails when the name is taken or malformed.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RegistryError::InvalidName(name));
        }
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.insert(tool);
        Ok(())
    }

    fn insert(&mut self, tool: Arc<dyn Tool>) {
        self.order.push(tool.name().to_string());
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Provider-ready schemas for all registered tools, in registration order.
    pub fn definitions(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// The shared oversized-result store.
    pub fn pager(&self) -> &Arc<ResultPager> {
        &self.pager
    }

    /// Dispatch one call.  Unknown tools become error outputs; oversized
    /// results are stored in the pager and replaced by their first page plus
    /// a retrieval instruction.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolOutput::err(&call.id, format!("unknown tool: {}", call.name));
        };

        // Held across the handler; released on every exit path by drop.
        let _guard = match (tool.file_param(), &self.locks) {
            (Some(param), Some(locks)) => match call.str_arg(param) {
                Some(key) => Some(locks.lock(key).await),
                None => None,
            },
            _ => None,
        };

        let output = tool.execute(call).await;
        self.paginate_if_oversized(output)
    }

    fn paginate_if_oversized(&self, output: ToolOutput) -> ToolOutput {
        if output.is_error || output.content.len() <= self.max_inline_bytes {
            return output;
        }
        let stored = self.pager.store(&output.content);
        if stored.total_pages < 2 {
            // Page size exceeds the inline budget; nothing to gain by paging.
            return output;
        }
        debug!(
            result_id = %stored.result_id,
            total_pages = stored.total_pages,
            bytes = output.content.len(),
            "tool result exceeds inline budget; stored for pagination"
        );
        ToolOutput::ok(
            &output.call_id,
            format!(
                "{}\n[truncated; call read_more(result_id=\"{}\", page=2) for more]",
                stored.first_page, stored.result_id
            ),
        )
    }

    /// Independent copy of this registry without the tools named in
    /// `exclude`.  Registration order is preserved; the pager and lock
    /// provider are shared with the parent.
    pub fn clone_excluding(&self, exclude: &[&str]) -> ToolRegistry {
        let order: Vec<String> = self
            .order
            .iter()
            .filter(|name| !exclude.contains(&name.as_str()))
            .cloned()
            .collect();
        let tools = order
            .iter()
            .map(|name| (name.clone(), self.tools[name].clone()))
            .collect();
        ToolRegistry {
            tools,
            order,
            pager: self.pager.clone(),
            locks: self.locks.clone(),
            max_inline_bytes: self.max_inline_bytes,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;

    /// Minimal echo tool for registry tests.
    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "properties": { "x": { "type": "string" } } })
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, call.str_arg("x").unwrap_or_default())
        }
    }

    /// Tool that returns a configurable amount of output.
    struct BlobTool {
        bytes: usize,
    }

    #[async_trait]
    impl Tool for BlobTool {
        fn name(&self) -> &str {
            "blob"
        }
        fn description(&self) -> &str {
            "returns a large blob"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, "z".repeat(self.bytes))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(100, 40)
    }

    #[test]
    fn read_more_is_registered_from_the_start() {
        let reg = registry();
        assert!(reg.get("read_more").is_some());
    }

    #[test]
    fn register_and_get() {
        let mut reg = registry();
        reg.register(EchoTool { name: "echo" }).unwrap();
        assert!(reg.get("echo").is_some());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut reg = registry();
        reg.register(EchoTool { name: "echo" }).unwrap();
        assert!(matches!(
            reg.register(EchoTool { name: "echo" }),
            Err(RegistryError::DuplicateTool(_))
        ));
    }

    #[test]
    fn invalid_name_is_rejected() {
        let mut reg = registry();
        assert!(matches!(
            reg.register(EchoTool { name: "bad name!" }),
            Err(RegistryError::InvalidName(_))
        ));
    }

    #[test]
    fn definitions_preserve_registration_order() {
        let mut reg = registry();
        reg.register(EchoTool { name: "zeta" }).unwrap();
        reg.register(EchoTool { name: "alpha" }).unwrap();
        let names: Vec<String> = reg.definitions().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["read_more", "zeta", "alpha"]);
    }

    #[tokio::test]
    async fn execute_dispatches_to_handler() {
        let mut reg = registry();
        reg.register(EchoTool { name: "echo" }).unwrap();
        let out = reg
            .execute(&ToolCall::new("1", "echo", json!({"x": "A"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content, "A");
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_error_output() {
        let reg = registry();
        let out = reg.execute(&ToolCall::new("1", "missing", json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn oversized_output_is_paginated() {
        let mut reg = registry();
        reg.register(BlobTool { bytes: 500 }).unwrap();
        let out = reg.execute(&ToolCall::new("1", "blob", json!({}))).await;
        assert!(!out.is_error);
        assert!(out.content.contains("[truncated; call read_more(result_id="));
        assert!(out.content.len() < 500);
    }

    #[tokio::test]
    async fn output_at_inline_budget_is_untouched() {
        let mut reg = registry();
        reg.register(BlobTool { bytes: 100 }).unwrap();
        let out = reg.execute(&ToolCall::new("1", "blob", json!({}))).await;
        assert_eq!(out.content, "z".repeat(100));
    }

    #[tokio::test]
    async fn paginated_result_reassembles_via_read_more() {
        let mut reg = registry();
        reg.register(BlobTool { bytes: 300 }).unwrap();
        let out = reg.execute(&ToolCall::new("1", "blob", json!({}))).await;

        // Pull the result_id out of the instruction suffix.
        let id_start = out.content.find("result_id=\"").unwrap() + "result_id=\"".len();
        let id_end = out.content[id_start..].find('"').unwrap() + id_start;
        let result_id = &out.content[id_start..id_end];

        let mut assembled = String::new();
        let mut page = 1;
        loop {
            let view = match reg.pager().page(result_id, page) {
                Ok(v) => v,
                Err(_) => break,
            };
            assembled.push_str(&view.content);
            page += 1;
        }
        assert_eq!(assembled, "z".repeat(300));
    }

    #[tokio::test]
    async fn read_more_retrieves_second_page_as_tool() {
        let mut reg = registry();
        reg.register(BlobTool { bytes: 300 }).unwrap();
        let out = reg.execute(&ToolCall::new("1", "blob", json!({}))).await;
        let id_start = out.content.find("result_id=\"").unwrap() + "result_id=\"".len();
        let id_end = out.content[id_start..].find('"').unwrap() + id_start;
        let result_id = out.content[id_start..id_end].to_string();

        let out = reg
            .execute(&ToolCall::new(
                "2",
                "read_more",
                json!({"result_id": result_id, "page": 2}),
            ))
            .await;
        assert!(!out.is_error);
        assert!(out.content.starts_with("zzzz"));
    }

    #[test]
    fn clone_excluding_removes_named_tools_in_order() {
        let mut reg = registry();
        reg.register(EchoTool { name: "a" }).unwrap();
        reg.register(EchoTool { name: "b" }).unwrap();
        reg.register(EchoTool { name: "c" }).unwrap();
        let clone = reg.clone_excluding(&["b"]);
        let names: Vec<String> = clone.definitions().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["read_more", "a", "c"]);
    }

    #[test]
    fn mutating_clone_does_not_affect_parent() {
        let mut reg = registry();
        reg.register(EchoTool { name: "a" }).unwrap();
        let mut clone = reg.clone_excluding(&[]);
        clone.register(EchoTool { name: "extra" }).unwrap();
        assert!(reg.get("extra").is_none());
        assert!(clone.get("extra").is_some());
    }

    #[tokio::test]
    async fn clone_shares_pager_with_parent() {
        let mut reg = registry();
        reg.register(BlobTool { bytes: 300 }).unwrap();
        let out = reg.execute(&ToolCall::new("1", "blob", json!({}))).await;
        let id_start = out.content.find("result_id=\"").unwrap() + "result_id=\"".len();
        let id_end = out.content[id_start..].find('"').unwrap() + id_start;
        let result_id = out.content[id_start..id_end].to_string();

        // A clone created after the fact can still read the stored pages.
        let clone = reg.clone_excluding(&["blob"]);
        let out = clone
            .execute(&ToolCall::new(
                "2",
                "read_more",
                json!({"result_id": result_id, "page": 1}),
            ))
            .await;
        assert!(!out.is_error);
    }

    // ── Locking ───────────────────────────────────────────────────────────────

    struct SlowWriteTool;

    #[async_trait]
    impl Tool for SlowWriteTool {
        fn name(&self) -> &str {
            "slow_write"
        }
        fn description(&self) -> &str {
            "writes slowly"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "properties": { "path": { "type": "string" } } })
        }
        fn file_param(&self) -> Option<&str> {
            Some("path")
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            ToolOutput::ok(&call.id, "written")
        }
    }

    #[tokio::test]
    async fn file_param_serialises_same_key() {
        let mut reg = ToolRegistry::new(1 << 20, 1 << 10)
            .with_lock_provider(Arc::new(FileLocks::new()));
        reg.register(SlowWriteTool).unwrap();
        let reg = Arc::new(reg);

        let start = std::time::Instant::now();
        let a = {
            let reg = reg.clone();
            tokio::spawn(async move {
                reg.execute(&ToolCall::new("1", "slow_write", json!({"path": "f"})))
                    .await
            })
        };
        let b = {
            let reg = reg.clone();
            tokio::spawn(async move {
                reg.execute(&ToolCall::new("2", "slow_write", json!({"path": "f"})))
                    .await
            })
        };
        a.await.unwrap();
        b.await.unwrap();
        // Two 30ms holds on one key cannot overlap.
        assert!(start.elapsed() >= std::time::Duration::from_millis(60));
    }

    #[tokio::test]
    async fn distinct_keys_run_concurrently() {
        let mut reg = ToolRegistry::new(1 << 20, 1 << 10)
            .with_lock_provider(Arc::new(FileLocks::new()));
        reg.register(SlowWriteTool).unwrap();
        let reg = Arc::new(reg);

        let start = std::time::Instant::now();
        let a = {
            let reg = reg.clone();
            tokio::spawn(async move {
                reg.execute(&ToolCall::new("1", "slow_write", json!({"path": "f1"})))
                    .await
            })
        };
        let b = {
            let reg = reg.clone();
            tokio::spawn(async move {
                reg.execute(&ToolCall::new("2", "slow_write", json!({"path": "f2"})))
                    .await
            })
        };
        a.await.unwrap();
        b.await.unwrap();
        assert!(start.elapsed() < std::time::Duration::from_millis(60));
    }
}
