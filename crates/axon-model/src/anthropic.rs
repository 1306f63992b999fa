// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    provider::ResponseStream, Completion, CompletionRequest, ContentBlock, Message, ModelProvider,
    ProviderError, ResponseEvent, Role, StopReason, Usage,
};

/// Provider for the Anthropic Messages API.
pub struct AnthropicProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: "https://api.anthropic.com".into(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the provider at a compatible proxy or test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(&self, req: &CompletionRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(build_wire_message).collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
            "stream": stream,
        });

        if !req.system.is_empty() {
            if req.cache_system_prompt {
                // A cache_control marker on the system block tells Anthropic
                // to cache the prompt prefix up to and including it.
                body["system"] = json!([{
                    "type": "text",
                    "text": req.system,
                    "cache_control": { "type": "ephemeral" },
                }]);
            } else {
                body["system"] = json!(req.system);
            }
        }

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }

    async fn send(
        &self,
        req: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Auth("ANTHROPIC_API_KEY not set".into()))?;

        debug!(model = %self.model, stream, tools = req.tools.len(), "sending anthropic request");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&self.build_body(req, stream))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let resp = self.send(&req, true).await?;

        // SSE lines can be split across TCP chunks, so a remainder buffer is
        // carried forward.  Only complete lines (terminated by '\n') are
        // parsed; anything left over is prepended to the next chunk.
        let event_stream = resp
            .bytes_stream()
            .scan(SseState::default(), |state, chunk| {
                let text = match chunk {
                    Ok(b) => String::from_utf8_lossy(&b).to_string(),
                    Err(e) => {
                        return futures::future::ready(Some(vec![Err(ProviderError::from(e))]));
                    }
                };
                state.buf.push_str(&text);
                let mut events: Vec<Result<ResponseEvent, ProviderError>> = Vec::new();
                while let Some(pos) = state.buf.find('\n') {
                    let line = state.buf[..pos].trim_end_matches('\r').to_string();
                    state.buf.drain(..=pos);
                    if let Some(data) = line.strip_prefix("data: ") {
                        if let Ok(v) = serde_json::from_str::<Value>(data.trim()) {
                            if let Some(ev) = parse_sse_event(&v, &mut state.stop_reason) {
                                events.push(Ok(ev));
                            }
                        }
                    }
                }
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }

    async fn create(&self, req: CompletionRequest) -> Result<Completion, ProviderError> {
        let resp = self.send(&req, false).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("malformed response body: {e}")))?;

        let text = body["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| {
                        (b["type"].as_str() == Some("text")).then(|| b["text"].as_str().unwrap_or(""))
                    })
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = Usage {
            input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(Completion { text, usage })
    }
}

#[derive(Default)]
struct SseState {
    buf: String,
    stop_reason: Option<StopReason>,
}

/// Map one parsed SSE payload to a [`ResponseEvent`].
///
/// The final stop reason arrives in `message_delta` but the stream only ends
/// at `message_stop`, so it is carried in `stop_reason` until then.  Events
/// with no consumer-visible effect return `None`.
fn parse_sse_event(v: &Value, stop_reason: &mut Option<StopReason>) -> Option<ResponseEvent> {
    match v["type"].as_str().unwrap_or("") {
        "content_block_start" => {
            let block = &v["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                return Some(ResponseEvent::ToolUse {
                    index: v["index"].as_u64().unwrap_or(0) as u32,
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: String::new(),
                });
            }
            None
        }
        "content_block_delta" => {
            let delta = &v["delta"];
            match delta["type"].as_str().unwrap_or("") {
                "text_delta" => Some(ResponseEvent::TextDelta(
                    delta["text"].as_str().unwrap_or("").to_string(),
                )),
                "input_json_delta" => Some(ResponseEvent::ToolUse {
                    index: v["index"].as_u64().unwrap_or(0) as u32,
                    id: String::new(),
                    name: String::new(),
                    arguments: delta["partial_json"].as_str().unwrap_or("").to_string(),
                }),
                _ => None,
            }
        }
        "message_start" => {
            let usage = &v["message"]["usage"];
            Some(ResponseEvent::Usage {
                input_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32,
                output_tokens: 0,
            })
        }
        "message_delta" => {
            if let Some(reason) = v["delta"]["stop_reason"].as_str() {
                *stop_reason = Some(parse_stop_reason(reason));
            }
            v.get("usage").map(|usage| ResponseEvent::Usage {
                input_tokens: 0,
                output_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as u32,
            })
        }
        "message_stop" => Some(ResponseEvent::Done {
            stop_reason: stop_reason.take().unwrap_or(StopReason::EndTurn),
        }),
        _ => None,
    }
}

fn parse_stop_reason(reason: &str) -> StopReason {
    match reason {
        "end_turn" | "stop_sequence" => StopReason::EndTurn,
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        _ => StopReason::Other,
    }
}

/// Serialize one conversation message to the Anthropic wire format.
fn build_wire_message(m: &Message) -> Value {
    let role = match m.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let content: Vec<Value> = m.content.iter().map(build_wire_block).collect();
    json!({ "role": role, "content": content })
}

fn build_wire_block(b: &ContentBlock) -> Value {
    match b {
        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
        ContentBlock::ToolUse { id, name, input } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let mut block = json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
            });
            if *is_error {
                block["is_error"] = json!(true);
            }
            block
        }
        ContentBlock::Image { media_type, data } => json!({
            "type": "image",
            "source": { "type": "base64", "media_type": media_type, "data": data },
        }),
        ContentBlock::Document {
            media_type,
            data,
            name,
        } => {
            let mut block = json!({
                "type": "document",
                "source": { "type": "base64", "media_type": media_type, "data": data },
            });
            if let Some(n) = name {
                block["title"] = json!(n);
            }
            block
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
