// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic for external commands and Kubernetes API calls.
//!
//! Two policies live here:
//!
//! - Terraform commands are retried a bounded number of times with a fixed
//!   delay, but only when their output matches a table of known transient
//!   errors. Anything else fails immediately.
//! - Kubernetes API calls are retried with exponential backoff on HTTP 429,
//!   5xx and connection errors, and fail fast on other client errors.

use crate::errors::{HarnessError, Result};
use rand::Rng;
use regex::Regex;
use std::future::Future;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Maximum total time to spend retrying (5 minutes)
const MAX_ELAPSED_TIME_SECS: u64 = 300;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Known transient error messages and the reason logged when one is retried.
///
/// Patterns are matched against the combined stdout/stderr of a failed command.
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    // Network contention when many tests run in parallel
    (
        ".*read: connection reset by peer.*",
        "Connection reset by peer while talking to a remote endpoint.",
    ),
    (
        ".*transport is closing.*",
        "Failed to reach Kubernetes API.",
    ),
    // Rate limiting
    (
        "(?i).*(too many requests|rate exceeded|throttling|ratelimit).*",
        "Rate limited by the remote API.",
    ),
    // Environment not ready yet
    (
        ".*the server is currently unable to handle the request.*",
        "Kubernetes API server not ready.",
    ),
    (
        "(?i).*(environment|cluster) is not (yet )?ready.*",
        "Environment not ready yet.",
    ),
    // Regional capacity
    (
        "(?i).*(InsufficientInstanceCapacity|ZONE_RESOURCE_POOL_EXHAUSTED|insufficient capacity).*",
        "Insufficient capacity in the target region.",
    ),
    // `terraform init` plugin downloads
    (
        ".*unable to verify signature.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*unable to verify checksum.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*no provider exists with the given name.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*registry service is unreachable.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*Error installing provider.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*Failed to query available provider packages.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*timeout while waiting for plugin to start.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*timed out waiting for server handshake.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        "could not query provider registry for",
        "Failed to retrieve plugin due to transient network error.",
    ),
    // Provider eventual consistency
    (
        ".*Provider produced inconsistent result after apply.*",
        "Provider eventual consistency error.",
    ),
];

static DEFAULT_TABLE: LazyLock<RetryableErrors> = LazyLock::new(|| {
    RetryableErrors::new(DEFAULT_RETRYABLE_ERRORS.iter().copied())
        .expect("default retryable error patterns are valid regular expressions")
});

/// A compiled transient-error pattern with its human-readable reason.
#[derive(Clone, Debug)]
pub struct RetryableError {
    /// Pattern matched against command output
    pub pattern: Regex,
    /// Reason logged when the pattern triggers a retry
    pub reason: String,
}

/// Ordered table of retryable errors. The first matching entry wins.
#[derive(Clone, Debug, Default)]
pub struct RetryableErrors {
    entries: Vec<RetryableError>,
}

impl RetryableErrors {
    /// Compile a table from `(pattern, reason)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidRegex`] if any pattern fails to compile.
    pub fn new<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let entries = pairs
            .into_iter()
            .map(|(pattern, reason)| {
                Regex::new(pattern)
                    .map(|compiled| RetryableError {
                        pattern: compiled,
                        reason: reason.to_string(),
                    })
                    .map_err(|source| HarnessError::InvalidRegex {
                        pattern: pattern.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Append entries from another table, skipping patterns already present.
    pub fn merge(&mut self, other: &RetryableErrors) {
        for entry in &other.entries {
            if !self
                .entries
                .iter()
                .any(|e| e.pattern.as_str() == entry.pattern.as_str())
            {
                self.entries.push(entry.clone());
            }
        }
    }

    /// Reason of the first entry whose pattern matches `output`.
    #[must_use]
    pub fn matching_reason(&self, output: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.pattern.is_match(output))
            .map(|e| e.reason.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The built-in transient error table.
#[must_use]
pub fn default_retryable_errors() -> RetryableErrors {
    DEFAULT_TABLE.clone()
}

/// Run `action` until it succeeds, retrying only on errors found in `retryable`.
///
/// The action runs at most `max_retries + 1` times with a fixed `sleep_between`
/// delay between attempts.
///
/// # Errors
///
/// - [`HarnessError::Fatal`] as soon as an error does not match the table
/// - [`HarnessError::MaxRetriesExceeded`] when every attempt failed with a
///   retryable error
pub async fn do_with_retryable_errors<T, F, Fut>(
    description: &str,
    retryable: &RetryableErrors,
    max_retries: usize,
    sleep_between: Duration,
    mut action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        info!(operation = description, attempt = attempt, "Running");

        let e = match action().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        operation = description,
                        attempt = attempt,
                        "Succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let Some(reason) = retryable.matching_reason(&e.output()) else {
            error!(
                operation = description,
                attempt = attempt,
                error = %e,
                "Non-retryable error, failing immediately"
            );
            return Err(HarnessError::Fatal {
                description: description.to_string(),
                source: Box::new(e),
            });
        };

        if attempt >= max_attempts {
            error!(
                operation = description,
                attempts = attempt,
                reason = reason,
                error = %e,
                "Max retries exceeded, giving up"
            );
            return Err(HarnessError::MaxRetriesExceeded {
                description: description.to_string(),
                attempts: attempt,
                last_error: Box::new(e),
            });
        }

        warn!(
            operation = description,
            attempt = attempt,
            reason = reason,
            retry_after = ?sleep_between,
            "Retryable error, will retry"
        );
        tokio::time::sleep(sleep_between).await;
    }
}

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Default exponential backoff for Kubernetes API retries.
///
/// # Configuration
///
/// - **Initial interval**: 100ms
/// - **Max interval**: 30 seconds
/// - **Max elapsed time**: 5 minutes total
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry a Kubernetes API call with exponential backoff.
///
/// Automatically retries on transient errors (HTTP 429, 5xx) and fails immediately
/// on permanent errors (4xx client errors except 429).
///
/// # Errors
///
/// Returns error if:
/// - Non-retryable error encountered (4xx client error)
/// - Backoff exhausted (5 minutes)
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, kube::Error>>,
{
    let mut backoff = default_backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_api_error(&e) {
                    debug!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable Kubernetes API error"
                    );
                    return Err(e.into());
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Kubernetes API error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e.into());
                }
            }
        }
    }
}

/// Determine if a Kubernetes error is transient.
///
/// HTTP 429, HTTP 5xx and service (network) errors are retryable. Everything
/// else, including 404 and 409, is returned to the caller.
pub(crate) fn is_retryable_api_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => api_err.code == 429 || (500..600).contains(&api_err.code),
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
