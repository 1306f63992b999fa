// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Advisory per-file locks for tool execution.
//!
//! The registry acquires a lock keyed by the value of a tool's `file_param`
//! before running its handler, so concurrent tool calls in the same registry
//! scope never interleave writes to one path.  Distinct keys never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct FileLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    /// The lock is released when the returned guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().expect("lock map mutex poisoned");
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_serialises_access() {
        let locks = Arc::new(FileLocks::new());
        let guard = locks.lock("a.txt").await;

        let locks2 = locks.clone();
        let contender = tokio::spawn(async move {
            let _g = locks2.lock("a.txt").await;
        });

        // The contender cannot finish while the guard is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = Arc::new(FileLocks::new());
        let _guard = locks.lock("a.txt").await;

        // A different key must be acquirable immediately.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock("b.txt")).await;
        assert!(other.is_ok(), "distinct key should not block");
    }

    #[tokio::test]
    async fn lock_is_reacquirable_after_release() {
        let locks = FileLocks::new();
        drop(locks.lock("a.txt").await);
        let _again = locks.lock("a.txt").await;
    }
}
