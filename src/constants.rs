// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the tfkube harness.
//!
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Terraform Constants
// ============================================================================

/// Default Terraform binary
pub const DEFAULT_TERRAFORM_BINARY: &str = "terraform";

/// Default number of retries for Terraform commands hitting transient errors
pub const DEFAULT_MAX_RETRIES: usize = 5;

/// Default fixed delay between Terraform retries (5 minutes)
pub const DEFAULT_TIME_BETWEEN_RETRIES_SECS: u64 = 300;

/// Value of the module's `name` variable in every scenario
pub const DEFAULT_WORKLOAD_NAME: &str = "test-name";

/// Label selector matching the pods created by the module
pub const WORKLOAD_LABEL_SELECTOR: &str = "app=test-name";

// ============================================================================
// Kubernetes Constants
// ============================================================================

/// Default kubectl binary
pub const DEFAULT_KUBECTL_BINARY: &str = "kubectl";

/// Prefix of every generated test namespace
pub const NAMESPACE_PREFIX: &str = "test-ns";

/// Label marking namespaces created by the harness
pub const LABEL_MANAGED_BY: &str = "managed-by";

/// Value for the `managed-by` label
pub const MANAGED_BY_VALUE: &str = "tfkube";

/// Label marking namespaces as test namespaces
pub const LABEL_TEST: &str = "test";

/// Value for the `test` label
pub const TEST_LABEL_VALUE: &str = "integration";

/// Annotation set on pods when linkerd injection is enabled
pub const LINKERD_INJECT_ANNOTATION: &str = "linkerd.io/inject";

/// HTTP status returned when creating an object that already exists
pub const HTTP_CONFLICT: u16 = 409;

/// HTTP status returned when deleting an object that is already gone
pub const HTTP_NOT_FOUND: u16 = 404;

/// Default number of polls while waiting for pods
pub const DEFAULT_POD_WAIT_RETRIES: usize = 60;

/// Default delay between pod polls
pub const DEFAULT_POD_WAIT_SLEEP_SECS: u64 = 5;

// ============================================================================
// Fixture Constants
// ============================================================================

/// Length of identifiers produced by [`crate::random::unique_id`]
pub const UNIQUE_ID_LENGTH: usize = 6;

/// Base-62 alphabet used for unique identifiers
pub const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Default location of the static manifest applied before Terraform
pub const DEFAULT_RESOURCES_PATH: &str = "tests/fixtures/resources.yml";

/// Terraform lock file, kept when copying a module
pub const TERRAFORM_LOCK_FILE: &str = ".terraform.lock.hcl";

/// tfenv version pin, kept when copying a module
pub const TERRAFORM_VERSION_FILE: &str = ".terraform-version";

// ============================================================================
// Environment Variables
// ============================================================================

/// Optional YAML file overlaying environment configuration
pub const ENV_CONFIG_FILE: &str = "TFKUBE_CONFIG";

/// Root of the Terraform module under test
pub const ENV_MODULE_DIR: &str = "TFKUBE_MODULE_DIR";

/// Static manifest applied before Terraform
pub const ENV_RESOURCES: &str = "TFKUBE_RESOURCES";

/// Terraform binary override
pub const ENV_TERRAFORM_BINARY: &str = "TFKUBE_TERRAFORM_BINARY";

/// kubectl binary override
pub const ENV_KUBECTL_BINARY: &str = "TFKUBE_KUBECTL_BINARY";

/// Kubeconfig context override
pub const ENV_KUBE_CONTEXT: &str = "TFKUBE_KUBE_CONTEXT";

/// Explicit kubeconfig file; `KUBECONFIG` itself is left to kube and kubectl
pub const ENV_KUBECONFIG: &str = "TFKUBE_KUBECONFIG";

/// Maximum Terraform retries
pub const ENV_MAX_RETRIES: &str = "TFKUBE_MAX_RETRIES";

/// Seconds between Terraform retries
pub const ENV_RETRY_SLEEP_SECS: &str = "TFKUBE_RETRY_SLEEP_SECS";

/// Keep temp module copies after the test
pub const ENV_KEEP_TEMP: &str = "TFKUBE_KEEP_TEMP";

/// Log output format (`text` or `json`)
pub const ENV_LOG_FORMAT: &str = "RUST_LOG_FORMAT";
