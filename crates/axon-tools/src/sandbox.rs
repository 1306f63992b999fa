// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Filesystem and process sandbox.
//!
//! All file-touching tools resolve paths through [`Sandbox::validate_path`],
//! which confines them to the sandbox root.  [`Sandbox::exec`] runs shell
//! commands inside the root with a hard wallclock limit and kills the child
//! on timeout or cancellation.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("path escapes sandbox root: {0}")]
    PathEscape(String),
    #[error("invalid sandbox root {0}: {1}")]
    InvalidRoot(String, std::io::Error),
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`.  The directory must exist; the root
    /// is canonicalized once so later prefix checks cannot be confused by
    /// symlinks in the root path itself.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SandboxError> {
        let root = root.into();
        let root = root
            .canonicalize()
            .map_err(|e| SandboxError::InvalidRoot(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` (absolute or root-relative) to a canonical path inside
    /// the root.  `..` components are resolved lexically so the check also
    /// covers paths that do not exist yet.
    pub fn validate_path(&self, path: &str) -> Result<PathBuf, SandboxError> {
        let joined = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.root.join(path)
        };

        let mut resolved = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(SandboxError::PathEscape(path.to_string()));
                    }
                }
                other => resolved.push(other),
            }
        }

        if !resolved.starts_with(&self.root) {
            return Err(SandboxError::PathEscape(path.to_string()));
        }
        Ok(resolved)
    }

    /// Run `command` through `sh -c` inside the sandbox, capturing stdout and
    /// stderr.  `working_dir` is validated against the root; the child is
    /// killed when the timeout elapses or the future is dropped.
    pub async fn exec(
        &self,
        command: &str,
        timeout: Duration,
        working_dir: Option<&str>,
    ) -> Result<ExecResult, SandboxError> {
        let cwd = match working_dir {
            Some(dir) => self.validate_path(dir)?,
            None => self.root.clone(),
        };

        debug!(command, cwd = %cwd.display(), "sandbox exec");

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| SandboxError::Timeout(timeout))??;

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
