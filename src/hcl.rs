// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rendering of Terraform variables as `-var` command-line arguments.
//!
//! Variables are held as JSON values and rendered into HCL expressions:
//!
//! - top-level strings are passed through untouched, so callers that want an
//!   HCL string literal for an `any`-typed variable pass `"\"value\""`
//! - strings nested in lists or maps are always double-quoted
//! - lists render as `[a, b]`, maps as `{"k" = v}` with keys sorted
//! - numbers and booleans render literally, `null` as `null`

use serde_json::Value;
use std::collections::BTreeMap;

/// Terraform input variables keyed by variable name.
pub type TerraformVars = BTreeMap<String, Value>;

/// Render a single value as an HCL expression.
#[must_use]
pub fn to_hcl_string(value: &Value, nested: bool) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if nested => format!("\"{s}\""),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(|v| to_hcl_string(v, true)).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let rendered: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("\"{k}\" = {}", to_hcl_string(v, true)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

/// Format variables as a flat `-var key=value` argument list, ordered by key.
#[must_use]
pub fn format_vars_as_args(vars: &TerraformVars) -> Vec<String> {
    vars.iter()
        .flat_map(|(key, value)| {
            [
                "-var".to_string(),
                format!("{key}={}", to_hcl_string(value, false)),
            ]
        })
        .collect()
}

#[cfg(test)]
#[path = "hcl_tests.rs"]
mod hcl_tests;
