// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! External store for oversized tool results.
//!
//! Results longer than the inline budget are stored here under a fresh
//! `result_id` and retrieved page by page via the `read_more` tool.  The
//! store lives outside the conversation, so compacting or truncating the
//! conversation never invalidates a stored result.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PagerError {
    #[error("unknown result_id: {0}")]
    UnknownResult(String),
    #[error("page {page} out of range; result has {total} pages (1-indexed)")]
    PageOutOfRange { page: usize, total: usize },
}

/// One retrieved page plus enough metadata for the caller to know whether
/// more pages remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub content: String,
    pub page: usize,
    pub total_pages: usize,
}

/// Handle returned when a result is stored.
#[derive(Debug, Clone)]
pub struct PagedResult {
    pub result_id: String,
    pub first_page: String,
    pub total_pages: usize,
}

pub struct ResultPager {
    page_bytes: usize,
    entries: Mutex<HashMap<String, Vec<String>>>,
}

impl ResultPager {
    pub fn new(page_bytes: usize) -> Self {
        Self {
            page_bytes: page_bytes.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store `text`, split into deterministic pages of at most `page_bytes`
    /// bytes each (splits never fall inside a UTF-8 sequence).
    pub fn store(&self, text: &str) -> PagedResult {
        let pages = split_pages(text, self.page_bytes);
        let result_id = Uuid::new_v4().to_string();
        let first_page = pages.first().cloned().unwrap_or_default();
        let total_pages = pages.len();
        self.entries
            .lock()
            .expect("pager mutex poisoned")
            .insert(result_id.clone(), pages);
        PagedResult {
            result_id,
            first_page,
            total_pages,
        }
    }

    /// Retrieve the `page`-th chunk (1-indexed) of a stored result.
    pub fn page(&self, result_id: &str, page: usize) -> Result<PageView, PagerError> {
        let entries = self.entries.lock().expect("pager mutex poisoned");
        let pages = entries
            .get(result_id)
            .ok_or_else(|| PagerError::UnknownResult(result_id.to_string()))?;
        if page == 0 || page > pages.len() {
            return Err(PagerError::PageOutOfRange {
                page,
                total: pages.len(),
            });
        }
        Ok(PageView {
            content: pages[page - 1].clone(),
            page,
            total_pages: pages.len(),
        })
    }
}

/// Split `text` into chunks of at most `page_bytes` bytes on char boundaries.
fn split_pages(text: &str, page_bytes: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut pages = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > page_bytes {
            pages.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        pages.push(current);
    }
    pages
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
