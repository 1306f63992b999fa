// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::{
    provider::ResponseStream, Completion, CompletionRequest, ModelProvider, ProviderError,
    ResponseEvent, StopReason, Usage,
};

/// Deterministic mock provider for tests.  Echoes the last user message back
/// as the assistant response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == crate::Role::User)
            .map(|m| m.text())
            .unwrap_or_else(|| "[no input]".into());

        let events: Vec<Result<ResponseEvent, ProviderError>> =
            text_script(format!("MOCK: {reply}")).into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(events)))
    }

    async fn create(&self, req: CompletionRequest) -> Result<Completion, ProviderError> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == crate::Role::User)
            .map(|m| m.text())
            .unwrap_or_else(|| "[no input]".into());
        Ok(Completion {
            text: format!("MOCK: {reply}"),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 10,
            },
        })
    }
}

/// One scripted response: either a streamed event sequence or a provider
/// error raised before any event is produced.
pub enum Script {
    Events(Vec<ResponseEvent>),
    Fail(ProviderError),
    /// Yield the events, then fail mid-stream with the error.
    EventsThenFail(Vec<ResponseEvent>, ProviderError),
}

/// A pre-scripted provider.  Each `stream` call pops the next script from the
/// front of the queue, so tests can specify exact event sequences — including
/// tool calls and injected errors — without network access.
pub struct ScriptedProvider {
    scripts: Mutex<Vec<Script>>,
    /// Replies returned by `create`, popped front-first; a canned summary is
    /// used once exhausted.
    create_replies: Mutex<Vec<String>>,
    /// Number of `create` calls observed (summarisation counter for tests).
    pub create_calls: AtomicUsize,
    /// The last request seen by `stream` or `create`, for inspection.
    pub last_request: Mutex<Option<CompletionRequest>>,
}

/// Standard event sequence for a plain text reply.
pub fn text_script(text: impl Into<String>) -> Vec<ResponseEvent> {
    vec![
        ResponseEvent::TextDelta(text.into()),
        ResponseEvent::Usage {
            input_tokens: 5,
            output_tokens: 5,
        },
        ResponseEvent::Done {
            stop_reason: StopReason::EndTurn,
        },
    ]
}

/// Standard event sequence for a single tool call.
pub fn tool_use_script(
    id: impl Into<String>,
    name: impl Into<String>,
    args_json: impl Into<String>,
) -> Vec<ResponseEvent> {
    vec![
        ResponseEvent::ToolUse {
            index: 0,
            id: id.into(),
            name: name.into(),
            arguments: args_json.into(),
        },
        ResponseEvent::Usage {
            input_tokens: 5,
            output_tokens: 5,
        },
        ResponseEvent::Done {
            stop_reason: StopReason::ToolUse,
        },
    ]
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Vec<ResponseEvent>>) -> Self {
        Self::from_scripts(scripts.into_iter().map(Script::Events).collect())
    }

    pub fn from_scripts(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            create_replies: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Provider that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![text_script(reply)])
    }

    /// Provider that returns one tool call, then a text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            tool_use_script(tool_id, tool_name, args_json),
            text_script(final_text),
        ])
    }

    /// Provider whose first `stream` call fails with `err`.
    pub fn fail_then(err: ProviderError, rest: Vec<Vec<ResponseEvent>>) -> Self {
        let mut scripts = vec![Script::Fail(err)];
        scripts.extend(rest.into_iter().map(Script::Events));
        Self::from_scripts(scripts)
    }

    /// Queue a reply for the next `create` call.
    pub fn push_create_reply(&self, reply: impl Into<String>) {
        self.create_replies.lock().unwrap().push(reply.into());
    }

    pub fn create_call_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        *self.last_request.lock().unwrap() = Some(req);
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                // Fallback once all scripts are consumed
                Script::Events(text_script("[no more scripts]"))
            } else {
                scripts.remove(0)
            }
        };
        match script {
            Script::Events(events) => {
                let wrapped: Vec<Result<ResponseEvent, ProviderError>> =
                    events.into_iter().map(Ok).collect();
                Ok(Box::pin(stream::iter(wrapped)))
            }
            Script::Fail(err) => Err(err),
            Script::EventsThenFail(events, err) => {
                let mut wrapped: Vec<Result<ResponseEvent, ProviderError>> =
                    events.into_iter().map(Ok).collect();
                wrapped.push(Err(err));
                Ok(Box::pin(stream::iter(wrapped)))
            }
        }
    }

    async fn create(&self, req: CompletionRequest) -> Result<Completion, ProviderError> {
        *self.last_request.lock().unwrap() = Some(req);
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let text = {
            let mut replies = self.create_replies.lock().unwrap();
            if replies.is_empty() {
                "Summary of the earlier conversation.".to_string()
            } else {
                replies.remove(0)
            }
        };
        Ok(Completion {
            text,
            usage: Usage {
                input_tokens: 10,
                output_tokens: 10,
            },
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::Message;

    fn req_with(text: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user(text)],
            max_tokens: 64,
            ..Default::default()
        }
    }

    async fn drain(mut s: ResponseStream) -> Vec<ResponseEvent> {
        let mut out = Vec::new();
        while let Some(ev) = s.next().await {
            out.push(ev.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn mock_echoes_last_user_message() {
        let p = MockProvider;
        let events = drain(p.stream(req_with("hi")).await.unwrap()).await;
        assert!(
            matches!(&events[0], ResponseEvent::TextDelta(t) if t.contains("MOCK: hi")),
            "unexpected: {events:?}"
        );
    }

    #[tokio::test]
    async fn mock_stream_ends_with_done() {
        let p = MockProvider;
        let events = drain(p.stream(req_with("hi")).await.unwrap()).await;
        assert!(matches!(events.last(), Some(ResponseEvent::Done { .. })));
    }

    #[tokio::test]
    async fn scripted_pops_scripts_in_order() {
        let p = ScriptedProvider::new(vec![text_script("first"), text_script("second")]);
        let ev1 = drain(p.stream(req_with("a")).await.unwrap()).await;
        let ev2 = drain(p.stream(req_with("b")).await.unwrap()).await;
        assert!(matches!(&ev1[0], ResponseEvent::TextDelta(t) if t == "first"));
        assert!(matches!(&ev2[0], ResponseEvent::TextDelta(t) if t == "second"));
    }

    #[tokio::test]
    async fn scripted_fallback_when_exhausted() {
        let p = ScriptedProvider::new(vec![]);
        let events = drain(p.stream(req_with("a")).await.unwrap()).await;
        assert!(matches!(&events[0], ResponseEvent::TextDelta(t) if t.contains("no more scripts")));
    }

    #[tokio::test]
    async fn scripted_fail_then_succeeds() {
        let p = ScriptedProvider::fail_then(
            ProviderError::Auth("nope".into()),
            vec![text_script("recovered")],
        );
        let err = match p.stream(req_with("a")).await {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(matches!(err, ProviderError::Auth(_)));
        let events = drain(p.stream(req_with("b")).await.unwrap()).await;
        assert!(matches!(&events[0], ResponseEvent::TextDelta(t) if t == "recovered"));
    }

    #[tokio::test]
    async fn scripted_create_counts_calls() {
        let p = ScriptedProvider::new(vec![]);
        p.push_create_reply("the summary");
        let c = p.create(req_with("summarise")).await.unwrap();
        assert_eq!(c.text, "the summary");
        assert_eq!(p.create_call_count(), 1);
    }

    #[tokio::test]
    async fn scripted_records_last_request() {
        let p = ScriptedProvider::always_text("ok");
        let _ = p.stream(req_with("inspect me")).await.unwrap();
        let seen = p.last_request.lock().unwrap();
        assert_eq!(seen.as_ref().unwrap().messages[0].text(), "inspect me");
    }
}
