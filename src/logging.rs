// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Logging setup for test runs.
//!
//! Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`text` or `json`).
//! Output goes through the libtest writer so it is captured per test and only
//! shown for failures or with `--nocapture`.

use crate::constants::ENV_LOG_FORMAT;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global tracing subscriber. Safe to call from every test.
pub fn init() {
    INIT.call_once(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let log_format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| "text".to_string());

        // try_init: another crate in the test binary may already own the global subscriber
        let _ = match log_format.to_lowercase().as_str() {
            "json" => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_test_writer()
                .json()
                .try_init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_test_writer()
                .compact()
                .try_init(),
        };
    });
}
