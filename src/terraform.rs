// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Terraform CLI driver.
//!
//! Wraps `terraform init`, `apply`, `destroy` and `output` for a module copied
//! by [`crate::test_structure`]. Variables are rendered with [`crate::hcl`] and
//! every command goes through the transient-error retry loop in
//! [`crate::retry`].
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tfkube::terraform::TerraformOptions;
//!
//! # async fn example() -> tfkube::errors::Result<()> {
//! let mut options = TerraformOptions::new("/tmp/module").with_default_retryable_errors();
//! options.vars.insert("name".to_string(), json!("test-name"));
//! options.vars.insert("replicas".to_string(), json!(2));
//!
//! options.init_and_apply().await?;
//! options.destroy().await?;
//! # Ok(())
//! # }
//! ```

use crate::command::{run_command, CommandSpec};
use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_TERRAFORM_BINARY, DEFAULT_TIME_BETWEEN_RETRIES_SECS,
};
use crate::errors::{HarnessError, Result};
use crate::hcl::{format_vars_as_args, TerraformVars};
use crate::retry::{default_retryable_errors, do_with_retryable_errors, RetryableErrors};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Everything needed to run Terraform against one module copy.
#[derive(Clone, Debug)]
pub struct TerraformOptions {
    /// Directory containing the module's `.tf` files
    pub terraform_dir: PathBuf,
    /// `terraform` or a compatible binary such as `tofu`
    pub terraform_binary: String,
    /// Input variables passed with `-var`
    pub vars: TerraformVars,
    /// Extra environment for every Terraform process
    pub env_vars: BTreeMap<String, String>,
    pub max_retries: usize,
    /// Fixed delay between attempts
    pub time_between_retries: Duration,
    pub retryable_errors: RetryableErrors,
    /// Pass `-no-color`
    pub no_color: bool,
    /// Value of `-lock` for state-modifying commands
    pub lock: bool,
}

impl TerraformOptions {
    /// Options for `terraform_dir` with no variables and no retryable errors.
    #[must_use]
    pub fn new(terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            terraform_dir: terraform_dir.into(),
            terraform_binary: DEFAULT_TERRAFORM_BINARY.to_string(),
            vars: TerraformVars::new(),
            env_vars: BTreeMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            time_between_retries: Duration::from_secs(DEFAULT_TIME_BETWEEN_RETRIES_SECS),
            retryable_errors: RetryableErrors::default(),
            no_color: false,
            lock: false,
        }
    }

    /// Add the built-in transient error table to these options.
    #[must_use]
    pub fn with_default_retryable_errors(mut self) -> Self {
        self.retryable_errors.merge(&default_retryable_errors());
        self
    }

    /// Set a variable, replacing any previous value.
    pub fn set_var(&mut self, name: &str, value: Value) -> &mut Self {
        self.vars.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn init_args(&self) -> Vec<String> {
        let mut args = vec!["init".to_string(), "-upgrade=false".to_string()];
        self.push_color(&mut args);
        args
    }

    #[must_use]
    pub fn apply_args(&self) -> Vec<String> {
        let mut args = vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ];
        self.push_lock(&mut args);
        self.push_color(&mut args);
        args.extend(format_vars_as_args(&self.vars));
        args
    }

    #[must_use]
    pub fn destroy_args(&self) -> Vec<String> {
        let mut args = vec![
            "destroy".to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
        ];
        self.push_lock(&mut args);
        self.push_color(&mut args);
        args.extend(format_vars_as_args(&self.vars));
        args
    }

    #[must_use]
    pub fn output_args(&self, name: &str) -> Vec<String> {
        let mut args = vec!["output".to_string(), "-json".to_string()];
        self.push_color(&mut args);
        args.push(name.to_string());
        args
    }

    fn push_lock(&self, args: &mut Vec<String>) {
        args.push(format!("-lock={}", self.lock));
    }

    fn push_color(&self, args: &mut Vec<String>) {
        if self.no_color {
            args.push("-no-color".to_string());
        }
    }

    fn command(&self, args: Vec<String>) -> CommandSpec {
        CommandSpec::new(&self.terraform_binary, args)
            .in_dir(&self.terraform_dir)
            .with_env(&self.env_vars)
    }

    async fn run_with_retry(&self, args: Vec<String>) -> Result<String> {
        let spec = self.command(args);
        let description = spec.display();
        do_with_retryable_errors(
            &description,
            &self.retryable_errors,
            self.max_retries,
            self.time_between_retries,
            || run_command(&spec),
        )
        .await
    }

    /// Run `terraform init`.
    ///
    /// # Errors
    ///
    /// Returns an error if init fails with a non-retryable error or runs out of retries.
    pub async fn init(&self) -> Result<String> {
        self.run_with_retry(self.init_args()).await
    }

    /// Run `terraform apply`.
    ///
    /// # Errors
    ///
    /// Returns an error if apply fails with a non-retryable error or runs out of retries.
    pub async fn apply(&self) -> Result<String> {
        self.run_with_retry(self.apply_args()).await
    }

    /// Run `terraform init` followed by `terraform apply`.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn init_and_apply(&self) -> Result<String> {
        info!(dir = %self.terraform_dir.display(), "Initializing and applying Terraform module");
        let mut output = self.init().await?;
        output.push_str(&self.apply().await?);
        Ok(output)
    }

    /// Run `terraform destroy`.
    ///
    /// # Errors
    ///
    /// Returns an error if destroy fails with a non-retryable error or runs out of retries.
    pub async fn destroy(&self) -> Result<String> {
        info!(dir = %self.terraform_dir.display(), "Destroying Terraform module");
        self.run_with_retry(self.destroy_args()).await
    }

    /// Read an output value as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or prints invalid JSON.
    pub async fn output_json(&self, name: &str) -> Result<Value> {
        let spec = self.command(self.output_args(name));
        let raw = run_command(&spec).await?;
        serde_json::from_str(raw.trim()).map_err(|source| HarnessError::InvalidOutput {
            command: spec.display(),
            source,
        })
    }
}

#[cfg(test)]
#[path = "terraform_tests.rs"]
mod terraform_tests;
