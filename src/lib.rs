// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # tfkube - acceptance tests for Terraform modules on Kubernetes
//!
//! tfkube drives a Terraform module that deploys a Kubernetes workload against
//! a live cluster and checks what actually got scheduled.
//!
//! ## Overview
//!
//! Each test follows the same linear flow:
//!
//! 1. copy the module to a temporary directory
//! 2. create a uniquely named namespace
//! 3. `kubectl apply` a static manifest (secrets, config maps)
//! 4. `terraform init` and `terraform apply` with the test's variables,
//!    retrying known transient errors
//! 5. read pods back from the API and assert on them
//! 6. tear down in reverse order
//!
//! ## Modules
//!
//! - [`scenario`] - Per-test lifecycle and teardown
//! - [`terraform`] - Terraform CLI driver
//! - [`hcl`] - Rendering variables as `-var` arguments
//! - [`retry`] - Transient error table and retry loops
//! - [`k8s`] - Namespace, manifest and pod helpers
//! - [`assertions`] - Readers for pod fields
//! - [`test_structure`] - Temporary module copies
//! - [`config`] - Environment and file configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tfkube::hcl::{format_vars_as_args, TerraformVars};
//!
//! let mut vars = TerraformVars::new();
//! vars.insert("annotations".to_string(), json!({ "foo": "bar" }));
//!
//! assert_eq!(
//!     format_vars_as_args(&vars),
//!     vec!["-var", "annotations={\"foo\" = \"bar\"}"]
//! );
//! ```

pub mod assertions;
pub mod command;
pub mod config;
pub mod constants;
pub mod errors;
pub mod hcl;
pub mod k8s;
pub mod logging;
pub mod random;
pub mod retry;
pub mod scenario;
pub mod terraform;
pub mod test_structure;
