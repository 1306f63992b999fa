// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! MCP adapter.
//!
//! Given a connected MCP client session, [`register_mcp_tools`] lists the
//! server's tools once and registers each of them in an
//! [`axon_tools::ToolRegistry`] as `{server}__{tool}`, with a proxy handler
//! that delegates execution to `call_tool`.  The bridge sits at the seam
//! between the registry and the MCP wire protocol so neither side needs to
//! know about the other.

mod bridge;

pub use bridge::{register_mcp_tools, McpProxyTool, McpSession};
