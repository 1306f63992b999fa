// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Normalises user text plus attachments into provider-neutral content
//! blocks.  Runs before any conversation mutation, so input errors never
//! leave a half-appended turn behind.

use base64::Engine;
use thiserror::Error;

use axon_model::ContentBlock;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("user content is empty")]
    EmptyContent,
    #[error("unsupported attachment media type: {0}")]
    UnsupportedAttachment(String),
    #[error("attachment payload is not valid base64: {0}")]
    InvalidPayload(String),
}

/// One user-supplied attachment.  `data` is always base64, matching the
/// provider wire format for binary blocks.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub media_type: String,
    pub data: String,
    pub name: Option<String>,
}

impl Attachment {
    pub fn new(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Convert `(text, attachments)` into an ordered list of content blocks.
///
/// Media type dispatch: `image/*` becomes an image block, `application/pdf`
/// a document block, text-like payloads are decoded and appended to the
/// prose.  Anything else is rejected before any provider call.
pub fn content_blocks(
    text: &str,
    attachments: &[Attachment],
) -> Result<Vec<ContentBlock>, InputError> {
    if text.trim().is_empty() && attachments.is_empty() {
        return Err(InputError::EmptyContent);
    }

    let mut prose = text.to_string();
    let mut binary_blocks = Vec::new();

    for att in attachments {
        if att.media_type.starts_with("image/") {
            binary_blocks.push(ContentBlock::Image {
                media_type: att.media_type.clone(),
                data: att.data.clone(),
            });
        } else if att.media_type == "application/pdf" {
            binary_blocks.push(ContentBlock::Document {
                media_type: att.media_type.clone(),
                data: att.data.clone(),
                name: att.name.clone(),
            });
        } else if is_text_like(&att.media_type) {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&att.data)
                .map_err(|_| InputError::InvalidPayload(att.media_type.clone()))?;
            let decoded = String::from_utf8_lossy(&bytes);
            let label = att.name.as_deref().unwrap_or("attachment");
            prose.push_str(&format!("\n\n[{label}]\n{decoded}"));
        } else {
            return Err(InputError::UnsupportedAttachment(att.media_type.clone()));
        }
    }

    let mut blocks = Vec::new();
    if !prose.trim().is_empty() {
        blocks.push(ContentBlock::text(prose));
    }
    blocks.extend(binary_blocks);
    Ok(blocks)
}

fn is_text_like(media_type: &str) -> bool {
    media_type.starts_with("text/")
        || media_type == "application/json"
        || media_type == "application/xml"
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
