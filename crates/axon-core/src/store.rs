// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! In-memory event store with resume semantics.
//!
//! One store is shared by every agent in the process.  Each stream is an
//! append-only ordered log with monotonically increasing ids; a client that
//! saw up to id `k` reconnects and reads `after_id = k` to receive exactly
//! the events it missed, ending with a terminal `done` or `error`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::events::AgentEvent;

#[derive(Error, Debug)]
pub enum EventStoreError {
    #[error("stream {0} is closed ({1:?})")]
    StreamClosed(String, StreamStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Running,
    Complete,
    Failed,
    Unknown,
}

/// One stored event with its stream-local id.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: u64,
    pub event: AgentEvent,
}

struct StreamRecord {
    events: Vec<StoredEvent>,
    next_id: u64,
    status: StreamStatus,
    fail_reason: Option<String>,
    last_touched: Instant,
}

impl StreamRecord {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            status: StreamStatus::Running,
            fail_reason: None,
            last_touched: Instant::now(),
        }
    }
}

pub struct EventStore {
    ttl: Duration,
    streams: Mutex<HashMap<String, StreamRecord>>,
}

impl EventStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Append one event, creating the stream on first use.  Returns the
    /// assigned id.  Appends to a completed or failed stream are rejected;
    /// ids are never reused after failure.
    pub fn append(&self, stream_id: &str, event: AgentEvent) -> Result<u64, EventStoreError> {
        let mut streams = self.streams.lock().expect("event store mutex poisoned");
        let record = streams
            .entry(stream_id.to_string())
            .or_insert_with(StreamRecord::new);
        if record.status != StreamStatus::Running {
            return Err(EventStoreError::StreamClosed(
                stream_id.to_string(),
                record.status,
            ));
        }
        let id = record.next_id;
        record.next_id += 1;
        record.events.push(StoredEvent { id, event });
        record.last_touched = Instant::now();
        Ok(id)
    }

    /// Events with `id > after_id`, in order, at most `max_count` of them.
    /// Reads are idempotent and never return an id at or below `after_id`.
    pub fn read(&self, stream_id: &str, after_id: Option<u64>, max_count: usize) -> Vec<StoredEvent> {
        let mut streams = self.streams.lock().expect("event store mutex poisoned");
        let Some(record) = streams.get_mut(stream_id) else {
            return Vec::new();
        };
        record.last_touched = Instant::now();
        let after = after_id.unwrap_or(0);
        record
            .events
            .iter()
            .filter(|e| e.id > after)
            .take(max_count)
            .cloned()
            .collect()
    }

    pub fn status(&self, stream_id: &str) -> StreamStatus {
        let streams = self.streams.lock().expect("event store mutex poisoned");
        streams
            .get(stream_id)
            .map(|r| r.status)
            .unwrap_or(StreamStatus::Unknown)
    }

    pub fn fail_reason(&self, stream_id: &str) -> Option<String> {
        let streams = self.streams.lock().expect("event store mutex poisoned");
        streams.get(stream_id).and_then(|r| r.fail_reason.clone())
    }

    pub fn mark_complete(&self, stream_id: &str) {
        self.set_status(stream_id, StreamStatus::Complete, None);
    }

    pub fn mark_failed(&self, stream_id: &str, reason: impl Into<String>) {
        self.set_status(stream_id, StreamStatus::Failed, Some(reason.into()));
    }

    fn set_status(&self, stream_id: &str, status: StreamStatus, reason: Option<String>) {
        let mut streams = self.streams.lock().expect("event store mutex poisoned");
        if let Some(record) = streams.get_mut(stream_id) {
            record.status = status;
            record.fail_reason = reason;
            record.last_touched = Instant::now();
        }
    }

    /// Evict streams untouched for longer than the TTL.  Returns the number
    /// of evicted streams.  Embedders run this from a periodic task.
    pub fn sweep(&self) -> usize {
        let mut streams = self.streams.lock().expect("event store mutex poisoned");
        let ttl = self.ttl;
        let before = streams.len();
        streams.retain(|_, r| r.last_touched.elapsed() < ttl);
        let evicted = before - streams.len();
        if evicted > 0 {
            debug!(evicted, "event store sweep");
        }
        evicted
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
