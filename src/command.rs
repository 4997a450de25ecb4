// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Running external binaries (`terraform`, `kubectl`).

use crate::errors::{HarnessError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// A fully described invocation of an external binary.
#[derive(Clone, Debug, Default)]
pub struct CommandSpec {
    pub binary: String,
    pub args: Vec<String>,
    /// Working directory; `None` inherits the current one
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables layered on top of the inherited environment
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(binary: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// The command line as it would be typed in a shell, for logs and errors.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.binary.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run a command to completion and return its combined stdout and stderr.
///
/// Every output line is logged with the `command` field so that parallel
/// scenarios can be told apart.
///
/// # Errors
///
/// Returns [`HarnessError::CommandFailed`] if the binary cannot be spawned or
/// exits non-zero. The error carries the captured output so retry tables can
/// match against it.
pub async fn run_command(spec: &CommandSpec) -> Result<String> {
    let command_line = spec.display();
    let dir = spec
        .working_dir
        .as_ref()
        .map(|d| d.display().to_string())
        .unwrap_or_default();

    info!(command = %command_line, dir = %dir, "Running command");

    let mut cmd = Command::new(&spec.binary);
    cmd.args(&spec.args).envs(&spec.env).kill_on_drop(true);
    if let Some(working_dir) = &spec.working_dir {
        cmd.current_dir(working_dir);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| HarnessError::CommandFailed {
            command: command_line.clone(),
            exit_code: None,
            output: format!("failed to spawn {}: {e}", spec.binary),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    for line in stdout.lines().chain(stderr.lines()) {
        debug!(command = %spec.binary, "{line}");
    }

    let mut combined = stdout.into_owned();
    if !stderr.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }

    if output.status.success() {
        Ok(combined)
    } else {
        Err(HarnessError::CommandFailed {
            command: command_line,
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod command_tests;
