// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use axon_config::AgentConfig;
use axon_model::{
    retry::RetryConfig, CompletionRequest, ContentBlock, Message, ModelProvider, ProviderError,
    ResponseEvent, Role, StopReason, ToolSchema, Usage,
};
use axon_tools::{ToolCall, ToolOutput, ToolRegistry};

use crate::compact::Compactor;
use crate::conversation::{Conversation, TokenCounter};
use crate::error::AgentError;
use crate::events::AgentEvent;
use crate::input::{self, Attachment};
use crate::prompts;
use crate::skills::SkillRegistry;
use crate::store::EventStore;

/// One user turn handed to [`Agent::stream_message`].
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// When set, every emitted event is mirrored into the event store under
    /// this id so a dropped client can resume.
    pub stream_id: Option<String>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }
}

impl From<&str> for UserInput {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

/// Delivers agent events to the caller's channel and, when a stream id is
/// active, to the event store.  Store failures are logged and never fatal.
struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
    store: Option<(Arc<EventStore>, String)>,
}

impl EventSink {
    async fn emit(&self, event: AgentEvent) {
        if let Some((store, stream_id)) = &self.store {
            if let Err(e) = store.append(stream_id, event.clone()) {
                warn!(stream_id = %stream_id, error = %e, "event store append failed");
            }
        }
        // A dropped receiver only means the caller stopped listening.
        let _ = self.tx.send(event).await;
    }

    fn mark_complete(&self) {
        if let Some((store, stream_id)) = &self.store {
            store.mark_complete(stream_id);
        }
    }

    fn mark_failed(&self, reason: &str) {
        if let Some((store, stream_id)) = &self.store {
            store.mark_failed(stream_id, reason);
        }
    }
}

/// One fully-collected model turn.
struct ModelTurn {
    text: String,
    tool_uses: Vec<ToolUseRequest>,
    usage: Usage,
    stop_reason: StopReason,
}

/// A tool_use block assembled from streamed fragments.
#[derive(Debug, Clone)]
struct ToolUseRequest {
    id: String,
    name: String,
    input: Value,
}

#[derive(Default)]
struct PendingToolUse {
    id: String,
    name: String,
    args_buf: String,
}

impl PendingToolUse {
    /// Resolve arguments to a JSON object.  Providers occasionally emit
    /// invalid argument JSON; substituting `{}` keeps the turn alive and the
    /// tool reports the missing parameters back to the model.
    fn finish(self) -> ToolUseRequest {
        let input = if self.args_buf.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&self.args_buf) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        tool_name = %self.name,
                        tool_use_id = %self.id,
                        error = %e,
                        "tool_use arguments are invalid JSON; substituting {{}}"
                    );
                    Value::Object(Default::default())
                }
            }
        };
        ToolUseRequest {
            id: self.id,
            name: self.name,
            input,
        }
    }
}

/// Aborts still-running tool tasks when dropped, so cancelling the agent
/// future propagates to in-flight handlers.
struct DispatchGuard {
    handles: Vec<Option<JoinHandle<ToolOutput>>>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        for handle in self.handles.iter().flatten() {
            handle.abort();
        }
    }
}

/// The core agent: owns a conversation and drives the model ↔ tool loop.
pub struct Agent {
    config: Arc<AgentConfig>,
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    skills: SkillRegistry,
    conversation: Conversation,
    counter: TokenCounter,
    compactor: Compactor,
    events: Option<Arc<EventStore>>,
}

impl Agent {
    pub fn new(
        config: Arc<AgentConfig>,
        provider: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let compactor = Compactor::new(config.compact_threshold, config.compact_protect_last_k);
        Self {
            config,
            provider,
            tools,
            skills: SkillRegistry::new(),
            conversation: Conversation::new(),
            counter: TokenCounter::new(),
            compactor,
            events: None,
        }
    }

    /// Mirror events into `store` for streams that carry a stream id.
    pub fn with_event_store(mut self, store: Arc<EventStore>) -> Self {
        self.events = Some(store);
        self
    }

    pub fn with_skills(mut self, skills: SkillRegistry) -> Self {
        self.skills = skills;
        self
    }

    /// Read-only snapshot of the conversation.
    pub fn conversation(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// Load a previously persisted conversation.
    pub fn load_conversation(&mut self, messages: Vec<Message>) {
        self.conversation.replace(messages);
    }

    pub fn skills_mut(&mut self) -> &mut SkillRegistry {
        &mut self.skills
    }

    pub fn token_counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Session reset: clears the conversation and the token counter.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.counter.reset();
    }

    /// Process one user turn, emitting text deltas and structured events
    /// through `tx` until a terminal `Done` or a fatal error.
    pub async fn stream_message(
        &mut self,
        input: impl Into<UserInput>,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<(), AgentError> {
        let input = input.into();
        // Input validation happens before any conversation mutation.
        let blocks = input::content_blocks(&input.text, &input.attachments)?;

        let sink = EventSink {
            tx,
            store: self.events.clone().zip(input.stream_id.clone()),
        };

        match self.run_turn(blocks, &sink).await {
            Ok(()) => {
                sink.mark_complete();
                Ok(())
            }
            Err(e) => {
                sink.mark_failed(&e.to_string());
                Err(e)
            }
        }
    }

    /// Like [`stream_message`](Self::stream_message) but aborts when `cancel`
    /// resolves (or its sender is dropped).  In-flight tool handlers are
    /// aborted, the provider stream is closed, and the event-store stream is
    /// marked failed with reason `cancelled`.
    pub async fn stream_message_with_cancel(
        &mut self,
        input: impl Into<UserInput>,
        tx: mpsc::Sender<AgentEvent>,
        mut cancel: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<(), AgentError> {
        let input = input.into();
        let blocks = input::content_blocks(&input.text, &input.attachments)?;

        let sink = EventSink {
            tx,
            store: self.events.clone().zip(input.stream_id.clone()),
        };

        let outcome = {
            let turn = self.run_turn(blocks, &sink);
            tokio::pin!(turn);
            tokio::select! {
                biased;
                _ = &mut cancel => None,
                result = &mut turn => Some(result),
            }
        };

        match outcome {
            None => {
                debug!("stream_message cancelled");
                sink.mark_failed("cancelled");
                Ok(())
            }
            Some(Ok(())) => {
                sink.mark_complete();
                Ok(())
            }
            Some(Err(e)) => {
                sink.mark_failed(&e.to_string());
                Err(e)
            }
        }
    }

    async fn run_turn(
        &mut self,
        blocks: Vec<ContentBlock>,
        sink: &EventSink,
    ) -> Result<(), AgentError> {
        self.conversation.push(Message::user_blocks(blocks));
        self.compact_if_needed(sink).await;

        let retry_cfg = RetryConfig::new(
            self.config.max_retries,
            Duration::from_millis(self.config.retry_initial_delay_ms),
        );
        let mut tool_rounds = 0u32;

        loop {
            // Iteration cap.  Checked before the next model call, after the
            // previous round's tool results were appended, so the synthetic
            // note keeps the conversation alternating and fully paired.
            if tool_rounds >= self.config.max_tool_iterations {
                let note = format!(
                    "Stopped after reaching the tool iteration limit ({}) for this message. \
                     The work above may be incomplete.",
                    self.config.max_tool_iterations
                );
                self.conversation.push(Message::assistant(note.clone()));
                sink.emit(AgentEvent::Error {
                    kind: "iteration_cap".into(),
                    message: note,
                })
                .await;
                sink.emit(AgentEvent::Done).await;
                return Ok(());
            }

            let req = self.build_request();

            // Provider call with backoff; each retry is surfaced as an event.
            let stream = {
                let mut attempt = 0u32;
                loop {
                    match self.provider.stream(req.clone()).await {
                        Ok(s) => break s,
                        Err(e) if e.is_retryable() && attempt < retry_cfg.max_retries => {
                            sink.emit(AgentEvent::Retry {
                                attempt,
                                kind: e.kind().into(),
                                message: e.to_string(),
                            })
                            .await;
                            tokio::time::sleep(retry_cfg.delay_for(attempt)).await;
                            attempt += 1;
                        }
                        Err(e) => return self.fail(e, String::new(), sink).await,
                    }
                }
            };

            let turn = match self.collect_turn(stream, sink).await {
                Ok(turn) => turn,
                Err((e, partial)) => return self.fail(e, partial, sink).await,
            };

            // Append the assistant turn exactly as the model produced it.
            let mut assistant_blocks = Vec::new();
            if !turn.text.is_empty() {
                assistant_blocks.push(ContentBlock::text(turn.text.clone()));
            }
            for tu in &turn.tool_uses {
                assistant_blocks.push(ContentBlock::tool_use(
                    tu.id.clone(),
                    tu.name.clone(),
                    tu.input.clone(),
                ));
            }
            if assistant_blocks.is_empty() {
                assistant_blocks.push(ContentBlock::text(String::new()));
            }
            self.conversation
                .push(Message::assistant_blocks(assistant_blocks));

            self.counter
                .update(turn.usage.input_tokens, turn.usage.output_tokens);
            sink.emit(AgentEvent::Usage {
                input_tokens: turn.usage.input_tokens,
                output_tokens: turn.usage.output_tokens,
            })
            .await;

            if turn.stop_reason == StopReason::ToolUse && !turn.tool_uses.is_empty() {
                tool_rounds += 1;
                let results = self.dispatch_tools(&turn.tool_uses, sink).await;
                self.conversation.push(Message::user_blocks(results));
                continue;
            }

            sink.emit(AgentEvent::Done).await;
            return Ok(());
        }
    }

    /// Drain one provider stream, forwarding text deltas as they arrive and
    /// assembling tool_use blocks keyed by their stream index.  On a
    /// mid-stream error the text accumulated so far is returned alongside it.
    async fn collect_turn(
        &self,
        mut stream: axon_model::ResponseStream,
        sink: &EventSink,
    ) -> Result<ModelTurn, (ProviderError, String)> {
        use futures::StreamExt;

        let mut text = String::new();
        let mut pending: HashMap<u32, PendingToolUse> = HashMap::new();
        let mut usage = Usage::default();
        let mut stop_reason = StopReason::EndTurn;

        while let Some(event) = stream.next().await {
            match event {
                Ok(ResponseEvent::TextDelta(delta)) => {
                    if !delta.is_empty() {
                        text.push_str(&delta);
                        sink.emit(AgentEvent::TextDelta(delta)).await;
                    }
                }
                Ok(ResponseEvent::ToolUse {
                    index,
                    id,
                    name,
                    arguments,
                }) => {
                    let entry = pending.entry(index).or_default();
                    if !id.is_empty() {
                        entry.id = id;
                    }
                    if !name.is_empty() {
                        entry.name = name;
                    }
                    entry.args_buf.push_str(&arguments);
                }
                Ok(ResponseEvent::Usage {
                    input_tokens,
                    output_tokens,
                }) => {
                    if input_tokens > 0 {
                        usage.input_tokens = input_tokens;
                    }
                    if output_tokens > 0 {
                        usage.output_tokens = output_tokens;
                    }
                }
                Ok(ResponseEvent::Done { stop_reason: r }) => {
                    stop_reason = r;
                    break;
                }
                Err(e) => return Err((e, text)),
            }
        }

        // Flush accumulated tool uses ordered by stream index.  A call with
        // no name cannot be dispatched and would corrupt the history sent
        // back to the provider, so it is dropped with a warning.
        let mut ordered: Vec<(u32, PendingToolUse)> = pending.into_iter().collect();
        ordered.sort_by_key(|(index, _)| *index);
        let mut tool_uses = Vec::new();
        for (i, (_, p)) in ordered.into_iter().enumerate() {
            if p.name.is_empty() {
                warn!(tool_use_id = %p.id, "dropping tool_use with empty name");
                continue;
            }
            let mut request = p.finish();
            if request.id.is_empty() {
                request.id = format!("toolu_synthetic_{i}");
                warn!(
                    tool_name = %request.name,
                    tool_use_id = %request.id,
                    "tool_use had empty id; generated synthetic id"
                );
            }
            tool_uses.push(request);
        }

        Ok(ModelTurn {
            text,
            tool_uses,
            usage,
            stop_reason,
        })
    }

    /// Run all tool calls of one assistant turn concurrently and return their
    /// `tool_result` blocks in the original order of the tool_use blocks,
    /// independent of completion order.  A failing or panicking handler
    /// becomes an `is_error` result; it never aborts the loop.
    async fn dispatch_tools(
        &self,
        uses: &[ToolUseRequest],
        sink: &EventSink,
    ) -> Vec<ContentBlock> {
        for tu in uses {
            sink.emit(AgentEvent::ToolCallStart {
                id: tu.id.clone(),
                name: tu.name.clone(),
                input: tu.input.clone(),
            })
            .await;
        }

        let mut guard = DispatchGuard {
            handles: uses
                .iter()
                .map(|tu| {
                    let registry = Arc::clone(&self.tools);
                    let call = ToolCall::new(tu.id.clone(), tu.name.clone(), tu.input.clone());
                    Some(tokio::spawn(async move { registry.execute(&call).await }))
                })
                .collect(),
        };

        let mut blocks = Vec::with_capacity(uses.len());
        for (i, tu) in uses.iter().enumerate() {
            let handle = guard.handles[i].take().expect("handle taken once");
            let output = match handle.await {
                Ok(output) => output,
                Err(e) => ToolOutput::err(&tu.id, format!("tool task panicked: {e}")),
            };
            sink.emit(AgentEvent::ToolCallEnd {
                id: tu.id.clone(),
                name: tu.name.clone(),
                output: output.content.clone(),
                is_error: output.is_error,
            })
            .await;
            blocks.push(ContentBlock::tool_result(
                &tu.id,
                output.content,
                output.is_error,
            ));
        }
        blocks
    }

    /// Compaction is best-effort from the loop's point of view: a failed
    /// summarisation call leaves the conversation untouched and the turn
    /// proceeds uncompacted.
    async fn compact_if_needed(&mut self, sink: &EventSink) {
        let fraction = self.counter.usage_fraction(self.config.context_window);
        if fraction < self.config.compact_threshold {
            return;
        }
        sink.emit(AgentEvent::CompactStart).await;
        let outcome = self
            .compactor
            .compact(
                self.conversation.inner_mut(),
                fraction,
                self.provider.as_ref(),
                self.config.max_tokens,
            )
            .await;
        let did_compact = match outcome {
            Ok(outcome) => outcome.did_compact(),
            Err(e) => {
                warn!(error = %e, "compaction summarisation failed; continuing uncompacted");
                false
            }
        };
        sink.emit(AgentEvent::CompactEnd { did_compact }).await;
    }

    /// Provider error recovery.  Auth errors rewind the just-appended user
    /// turn so the identical message can be resubmitted; anything else
    /// preserves the partial assistant text so pairing and alternation hold.
    async fn fail(
        &mut self,
        error: ProviderError,
        partial_text: String,
        sink: &EventSink,
    ) -> Result<(), AgentError> {
        match &error {
            ProviderError::Auth(_) => {
                // Rewind only a plain user message; a tool-result turn must
                // stay paired with its assistant tool_use turn.
                let rewindable = self
                    .conversation
                    .messages()
                    .last()
                    .map(|m| m.role == Role::User && m.tool_result_ids().is_empty())
                    .unwrap_or(false);
                if rewindable {
                    self.conversation.pop_last_user_turn();
                }
            }
            _ => {
                if !partial_text.is_empty() {
                    self.conversation.push(Message::assistant(partial_text));
                }
            }
        }
        sink.emit(AgentEvent::Error {
            kind: error.kind().into(),
            message: error.to_string(),
        })
        .await;
        Err(AgentError::Provider(error))
    }

    fn build_request(&self) -> CompletionRequest {
        CompletionRequest {
            messages: self.conversation.messages().to_vec(),
            system: prompts::render_system_prompt(&self.config.system_prompt, &self.skills),
            tools: self
                .tools
                .definitions()
                .into_iter()
                .map(|s| ToolSchema {
                    name: s.name,
                    description: s.description,
                    parameters: s.parameters,
                })
                .collect(),
            max_tokens: self.config.max_tokens,
            cache_system_prompt: self.config.enable_prompt_caching,
        }
    }
}
