// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::pager::ResultPager;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Retrieves further pages of an oversized tool result stored by the
/// registry's pager.
pub struct ReadMoreTool {
    pager: Arc<ResultPager>,
}

impl ReadMoreTool {
    pub fn new(pager: Arc<ResultPager>) -> Self {
        Self { pager }
    }
}

#[async_trait]
impl Tool for ReadMoreTool {
    fn name(&self) -> &str {
        "read_more"
    }

    fn description(&self) -> &str {
        "Retrieve the next page of a truncated tool result. Pass the result_id from the \
         truncation notice and the 1-indexed page number to fetch."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "result_id": {
                    "type": "string",
                    "description": "Identifier from the truncation notice"
                },
                "page": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "1-indexed page to retrieve"
                }
            },
            "required": ["result_id", "page"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(result_id) = call.str_arg("result_id") else {
            return ToolOutput::err(&call.id, "missing 'result_id'");
        };
        let Some(page) = call.args.get("page").and_then(|v| v.as_u64()) else {
            return ToolOutput::err(&call.id, "missing or non-integer 'page'");
        };

        match self.pager.page(result_id, page as usize) {
            Ok(view) if view.page < view.total_pages => ToolOutput::ok(
                &call.id,
                format!(
                    "{}\n[page {} of {}; call read_more(result_id=\"{}\", page={}) for more]",
                    view.content,
                    view.page,
                    view.total_pages,
                    result_id,
                    view.page + 1
                ),
            ),
            Ok(view) => ToolOutput::ok(&call.id, view.content),
            Err(e) => ToolOutput::err(&call.id, e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
