// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the tfkube harness.
//!
//! Every fallible harness operation returns [`HarnessError`]. Test glue that
//! only needs to fail the test wraps these in `anyhow` with context.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that can occur while preparing, applying or inspecting a test scenario.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Filesystem failure while copying the module or reading fixtures
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written when the error happened
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The Terraform module root does not exist or is not a directory
    #[error("Terraform module folder '{0}' does not exist or is not a directory")]
    ModuleNotFound(PathBuf),

    /// An external command (terraform, kubectl) could not be spawned or exited non-zero
    #[error("Command '{command}' failed with exit code {exit_code:?}: {output}")]
    CommandFailed {
        /// The command line that was executed
        command: String,
        /// Process exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Combined stdout and stderr
        output: String,
    },

    /// A command failed with an error that is not in the retryable table
    #[error("'{description}' failed with a non-retryable error: {source}")]
    Fatal {
        /// Human-readable description of the action
        description: String,
        /// The error that stopped the retry loop
        #[source]
        source: Box<HarnessError>,
    },

    /// All retries were used up on transient errors
    #[error("'{description}' unsuccessful after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Human-readable description of the action
        description: String,
        /// Number of attempts that were made
        attempts: usize,
        /// The error reported by the final attempt
        last_error: Box<HarnessError>,
    },

    /// A command succeeded but printed something that is not the expected JSON
    #[error("Could not parse output of '{command}': {source}")]
    InvalidOutput {
        /// The command line that was executed
        command: String,
        /// JSON decoding error
        #[source]
        source: serde_json::Error,
    },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubeconfig could not be read or resolved
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Watch-based wait failed
    #[error("Wait failed: {0}")]
    Wait(#[from] kube::runtime::wait::Error),

    /// A polling wait gave up before the condition held
    #[error("Timed out after {elapsed:?} waiting for {what}")]
    Timeout {
        /// Description of the awaited condition
        what: String,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// Invalid harness configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A retryable-error pattern is not a valid regular expression
    #[error("Invalid retryable error pattern '{pattern}': {source}")]
    InvalidRegex {
        /// The offending pattern
        pattern: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },
}

impl HarnessError {
    /// Build an [`HarnessError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Text that retryable-error patterns are matched against.
    ///
    /// For command failures this is the captured output; for everything else
    /// it is the rendered error message.
    #[must_use]
    pub fn output(&self) -> String {
        match self {
            Self::CommandFailed { output, .. } => output.clone(),
            other => other.to_string(),
        }
    }
}
