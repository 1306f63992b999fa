// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use axon_model::{Message, Role};

/// The agent's conversation history.
///
/// Exclusively owned by one [`crate::Agent`]; turns strictly alternate user
/// and assistant.  Embedders read it through [`Conversation::messages`] for
/// session persistence and may load a saved history with
/// [`Conversation::replace`].
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Replace the whole history (loading a persisted session).
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Remove and return the final message if it is a user turn.  Used to
    /// rewind after an authentication failure so the same message can be
    /// resubmitted once credentials are fixed.
    pub fn pop_last_user_turn(&mut self) -> Option<Message> {
        if self.messages.last()?.role == Role::User {
            self.messages.pop()
        } else {
            None
        }
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Vec<Message> {
        &mut self.messages
    }

    /// Fallback token estimate over the whole history.
    pub fn approx_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.approx_tokens()).sum()
    }
}

/// Running token usage for one agent, fed from provider-reported usage after
/// each assistant turn.  An estimate, not an accounting system: the provider
/// figures already include the full prompt, so only the latest turn counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenCounter {
    input_tokens: u32,
    output_tokens: u32,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the usage of the turn that just completed.
    pub fn update(&mut self, input_tokens: u32, output_tokens: u32) {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
    }

    pub fn input_tokens(&self) -> u32 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u32 {
        self.output_tokens
    }

    /// Fraction of the context window the last turn consumed (0.0–1.0+).
    pub fn usage_fraction(&self, context_window: usize) -> f32 {
        if context_window == 0 {
            return 0.0;
        }
        (self.input_tokens + self.output_tokens) as f32 / context_window as f32
    }

    /// Session reset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_appends_messages() {
        let mut c = Conversation::new();
        c.push(Message::user("hi"));
        c.push(Message::assistant("hello"));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn pop_last_user_turn_removes_trailing_user() {
        let mut c = Conversation::new();
        c.push(Message::user("a"));
        c.push(Message::assistant("b"));
        c.push(Message::user("c"));
        let popped = c.pop_last_user_turn().unwrap();
        assert_eq!(popped.text(), "c");
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn pop_last_user_turn_is_noop_on_assistant_tail() {
        let mut c = Conversation::new();
        c.push(Message::user("a"));
        c.push(Message::assistant("b"));
        assert!(c.pop_last_user_turn().is_none());
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn pop_last_user_turn_on_empty_is_none() {
        let mut c = Conversation::new();
        assert!(c.pop_last_user_turn().is_none());
    }

    #[test]
    fn counter_update_replaces_previous_turn() {
        let mut t = TokenCounter::new();
        t.update(100, 10);
        t.update(200, 20);
        assert_eq!(t.input_tokens(), 200);
        assert_eq!(t.output_tokens(), 20);
    }

    #[test]
    fn usage_fraction_is_sum_over_window() {
        let mut t = TokenCounter::new();
        t.update(70, 10);
        assert!((t.usage_fraction(100) - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn usage_fraction_zero_window_does_not_panic() {
        let mut t = TokenCounter::new();
        t.update(70, 10);
        assert_eq!(t.usage_fraction(0), 0.0);
    }

    #[test]
    fn reset_clears_counter() {
        let mut t = TokenCounter::new();
        t.update(70, 10);
        t.reset();
        assert_eq!(t.usage_fraction(100), 0.0);
    }
}
