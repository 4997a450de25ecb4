// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Random identifiers for isolating parallel test runs.

use crate::constants::{BASE62_CHARS, NAMESPACE_PREFIX, UNIQUE_ID_LENGTH};
use rand::Rng;

/// Generate a short base-62 identifier.
///
/// Six characters give about 56 billion combinations, which is plenty to keep
/// concurrently running tests from colliding.
#[must_use]
pub fn unique_id() -> String {
    let mut rng = rand::thread_rng();
    (0..UNIQUE_ID_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..BASE62_CHARS.len());
            char::from(BASE62_CHARS[idx])
        })
        .collect()
}

/// Build a namespace name of the form `test-ns-<suffix>-<id>`.
///
/// The identifier is lowercased so the result is a valid DNS-1123 label as
/// long as `suffix` is.
#[must_use]
pub fn unique_namespace(suffix: &str) -> String {
    format!(
        "{NAMESPACE_PREFIX}-{suffix}-{}",
        unique_id().to_lowercase()
    )
}

#[cfg(test)]
#[path = "random_tests.rs"]
mod random_tests;
