// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Tool registry and execution layer: registration, dispatch, oversized
//! result pagination, per-file locking, and the sandbox every file-touching
//! tool resolves paths through.

pub mod builtin;
mod locks;
mod pager;
mod registry;
mod sandbox;
mod tool;

pub use builtin::{MemoryTool, ReadMoreTool, RunCommandTool};
pub use locks::FileLocks;
pub use pager::{PagedResult, PageView, PagerError, ResultPager};
pub use registry::{RegistryError, ToolRegistry, ToolSchema};
pub use sandbox::{ExecResult, Sandbox, SandboxError};
pub use tool::{Tool, ToolCall, ToolOutput};
