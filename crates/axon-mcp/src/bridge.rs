// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool as McpTool};
use serde_json::Value;
use tracing::debug;

use axon_tools::{RegistryError, Tool, ToolCall, ToolOutput, ToolRegistry};

/// Client side of one connected MCP server.
///
/// Transport-agnostic: implementations wrap an `rmcp` peer, a WebSocket
/// proxy, or a test double.  `list_tools` is called once at registration
/// time; `call_tool` per invocation.
#[async_trait]
pub trait McpSession: Send + Sync {
    async fn list_tools(&self) -> anyhow::Result<Vec<McpTool>>;
    async fn call_tool(&self, name: &str, args: Value) -> anyhow::Result<CallToolResult>;
}

/// A registry tool that proxies execution to an MCP server.
pub struct McpProxyTool {
    session: Arc<dyn McpSession>,
    /// Name under which the tool is registered: `{server}__{tool}`,
    /// sanitised to the registry's `[A-Za-z0-9_]+` alphabet.
    qualified_name: String,
    /// Original tool name on the server, forwarded to `call_tool` verbatim.
    remote_name: String,
    description: String,
    parameters: Value,
}

impl McpProxyTool {
    fn new(session: Arc<dyn McpSession>, server: &str, tool: &McpTool) -> Self {
        let remote_name = tool.name.to_string();
        Self {
            session,
            qualified_name: sanitize_name(&format!("{server}__{remote_name}")),
            remote_name,
            description: tool.description.as_deref().unwrap_or_default().to_string(),
            parameters: Value::Object((*tool.input_schema).clone()),
        }
    }
}

#[async_trait]
impl Tool for McpProxyTool {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        debug!(tool = %self.remote_name, "delegating tool call to MCP server");
        match self.session.call_tool(&self.remote_name, call.args.clone()).await {
            Ok(result) => {
                let text = collect_text(&result);
                if result.is_error.unwrap_or(false) {
                    ToolOutput::err(&call.id, text)
                } else {
                    ToolOutput::ok(&call.id, text)
                }
            }
            Err(e) => ToolOutput::err(&call.id, format!("MCP call failed: {e}")),
        }
    }
}

/// List the server's tools once and register each as `{server}__{tool}`.
/// Returns the number of tools registered.
pub async fn register_mcp_tools(
    registry: &mut ToolRegistry,
    session: Arc<dyn McpSession>,
    server: &str,
) -> anyhow::Result<usize> {
    let tools = session.list_tools().await?;
    let mut registered = 0usize;
    for tool in &tools {
        let proxy = McpProxyTool::new(session.clone(), server, tool);
        registry
            .register(proxy)
            .map_err(|e: RegistryError| anyhow::anyhow!(e))?;
        registered += 1;
    }
    debug!(server, registered, "registered MCP tools");
    Ok(registered)
}

/// Concatenated text content of a call result; non-text blocks are skipped.
fn collect_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|c| c.raw.as_text().map(|t| t.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Map a qualified name onto the registry's `[A-Za-z0-9_]+` alphabet.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use rmcp::model::Content;
    use serde_json::json;

    use super::*;

    struct FakeSession;

    #[async_trait]
    impl McpSession for FakeSession {
        async fn list_tools(&self) -> anyhow::Result<Vec<McpTool>> {
            let schema = match json!({
                "type": "object",
                "properties": { "q": { "type": "string" } }
            }) {
                Value::Object(m) => m,
                _ => unreachable!(),
            };
            Ok(vec![
                McpTool::new(
                    std::borrow::Cow::Borrowed("search"),
                    std::borrow::Cow::Borrowed("Search the index"),
                    Arc::new(schema.clone()),
                ),
                McpTool::new(
                    std::borrow::Cow::Borrowed("fetch-page"),
                    std::borrow::Cow::Borrowed("Fetch a page"),
                    Arc::new(schema),
                ),
            ])
        }

        async fn call_tool(&self, name: &str, args: Value) -> anyhow::Result<CallToolResult> {
            if name == "search" {
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "results for {}",
                    args["q"].as_str().unwrap_or("?")
                ))]))
            } else {
                Ok(CallToolResult {
                    content: vec![Content::text("remote failure")],
                    is_error: Some(true),
                    structured_content: None,
                    meta: None,
                })
            }
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(30 * 1024, 8 * 1024)
    }

    #[tokio::test]
    async fn tools_are_registered_with_server_prefix() {
        let mut reg = registry();
        let count = register_mcp_tools(&mut reg, Arc::new(FakeSession), "docs")
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert!(reg.get("docs__search").is_some());
    }

    #[tokio::test]
    async fn remote_names_are_sanitized_for_registration() {
        let mut reg = registry();
        register_mcp_tools(&mut reg, Arc::new(FakeSession), "docs")
            .await
            .unwrap();
        // "fetch-page" carries a dash the registry alphabet rejects.
        assert!(reg.get("docs__fetch_page").is_some());
    }

    #[tokio::test]
    async fn proxy_delegates_and_returns_text() {
        let mut reg = registry();
        register_mcp_tools(&mut reg, Arc::new(FakeSession), "docs")
            .await
            .unwrap();
        let out = reg
            .execute(&ToolCall::new("1", "docs__search", json!({"q": "rust"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content, "results for rust");
    }

    #[tokio::test]
    async fn remote_error_flag_maps_to_tool_error() {
        let mut reg = registry();
        register_mcp_tools(&mut reg, Arc::new(FakeSession), "docs")
            .await
            .unwrap();
        let out = reg
            .execute(&ToolCall::new("1", "docs__fetch_page", json!({})))
            .await;
        assert!(out.is_error);
        assert_eq!(out.content, "remote failure");
    }

    #[tokio::test]
    async fn schema_passes_through() {
        let mut reg = registry();
        register_mcp_tools(&mut reg, Arc::new(FakeSession), "docs")
            .await
            .unwrap();
        let defs = reg.definitions();
        let search = defs.iter().find(|d| d.name == "docs__search").unwrap();
        assert_eq!(search.parameters["properties"]["q"]["type"], "string");
        assert_eq!(search.description, "Search the index");
    }
}
