// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Harness configuration.
//!
//! Settings come from environment variables. If `TFKUBE_CONFIG` names a YAML
//! file, values present in that file are applied first and environment
//! variables still win.
//!
//! ```yaml
//! moduleRoot: /src/terraform-kubernetes-workload
//! resourcesPath: tests/fixtures/resources.yml
//! terraformBinary: tofu
//! maxRetries: 3
//! timeBetweenRetriesSecs: 60
//! ```

use crate::constants::{
    DEFAULT_KUBECTL_BINARY, DEFAULT_MAX_RETRIES, DEFAULT_RESOURCES_PATH, DEFAULT_TERRAFORM_BINARY,
    DEFAULT_TIME_BETWEEN_RETRIES_SECS, ENV_CONFIG_FILE, ENV_KEEP_TEMP, ENV_KUBECONFIG,
    ENV_KUBECTL_BINARY, ENV_KUBE_CONTEXT, ENV_MAX_RETRIES, ENV_MODULE_DIR, ENV_RESOURCES,
    ENV_RETRY_SLEEP_SECS, ENV_TERRAFORM_BINARY,
};
use crate::errors::{HarnessError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Resolved harness settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Root of the Terraform module under test
    pub module_root: Option<PathBuf>,
    /// Static manifest applied before Terraform
    pub resources_path: PathBuf,
    pub terraform_binary: String,
    pub kubectl_binary: String,
    /// Kubeconfig context; `None` uses the current context
    pub kube_context: Option<String>,
    /// Single kubeconfig file; `None` defers to `KUBECONFIG` and `~/.kube/config`
    pub kubeconfig: Option<PathBuf>,
    pub max_retries: usize,
    pub time_between_retries: Duration,
    /// Keep temp module copies after the test for debugging
    pub keep_temp: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            module_root: None,
            resources_path: PathBuf::from(DEFAULT_RESOURCES_PATH),
            terraform_binary: DEFAULT_TERRAFORM_BINARY.to_string(),
            kubectl_binary: DEFAULT_KUBECTL_BINARY.to_string(),
            kube_context: None,
            kubeconfig: None,
            max_retries: DEFAULT_MAX_RETRIES,
            time_between_retries: Duration::from_secs(DEFAULT_TIME_BETWEEN_RETRIES_SECS),
            keep_temp: false,
        }
    }
}

/// On-disk form of the configuration. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub module_root: Option<PathBuf>,
    pub resources_path: Option<PathBuf>,
    pub terraform_binary: Option<String>,
    pub kubectl_binary: Option<String>,
    pub kube_context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub max_retries: Option<usize>,
    pub time_between_retries_secs: Option<u64>,
    pub keep_temp: Option<bool>,
}

impl HarnessConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if a
    /// numeric or boolean variable has an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// See [`HarnessConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_empty(lookup(ENV_CONFIG_FILE)) {
            debug!(path = %path, "Loading harness config file");
            let text = std::fs::read_to_string(&path).map_err(|e| HarnessError::io(&path, e))?;
            config.apply_file(parse_config_file(&text)?);
        }

        if let Some(v) = non_empty(lookup(ENV_MODULE_DIR)) {
            config.module_root = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(lookup(ENV_RESOURCES)) {
            config.resources_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty(lookup(ENV_TERRAFORM_BINARY)) {
            config.terraform_binary = v;
        }
        if let Some(v) = non_empty(lookup(ENV_KUBECTL_BINARY)) {
            config.kubectl_binary = v;
        }
        if let Some(v) = non_empty(lookup(ENV_KUBE_CONTEXT)) {
            config.kube_context = Some(v);
        }
        if let Some(v) = non_empty(lookup(ENV_KUBECONFIG)) {
            config.kubeconfig = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(lookup(ENV_MAX_RETRIES)) {
            config.max_retries = v.parse().map_err(|_| {
                HarnessError::Config(format!("{ENV_MAX_RETRIES} must be an integer, got '{v}'"))
            })?;
        }
        if let Some(v) = non_empty(lookup(ENV_RETRY_SLEEP_SECS)) {
            let secs: u64 = v.parse().map_err(|_| {
                HarnessError::Config(format!(
                    "{ENV_RETRY_SLEEP_SECS} must be an integer, got '{v}'"
                ))
            })?;
            config.time_between_retries = Duration::from_secs(secs);
        }
        if let Some(v) = non_empty(lookup(ENV_KEEP_TEMP)) {
            config.keep_temp = parse_bool(ENV_KEEP_TEMP, &v)?;
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if file.module_root.is_some() {
            self.module_root = file.module_root;
        }
        if let Some(v) = file.resources_path {
            self.resources_path = v;
        }
        if let Some(v) = file.terraform_binary {
            self.terraform_binary = v;
        }
        if let Some(v) = file.kubectl_binary {
            self.kubectl_binary = v;
        }
        if file.kube_context.is_some() {
            self.kube_context = file.kube_context;
        }
        if file.kubeconfig.is_some() {
            self.kubeconfig = file.kubeconfig;
        }
        if let Some(v) = file.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = file.time_between_retries_secs {
            self.time_between_retries = Duration::from_secs(v);
        }
        if let Some(v) = file.keep_temp {
            self.keep_temp = v;
        }
    }
}

/// Parse the YAML config file format.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] on malformed YAML or unknown keys.
pub fn parse_config_file(text: &str) -> Result<ConfigFile> {
    serde_yaml::from_str(text).map_err(|e| HarnessError::Config(format!("config file: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HarnessError::Config(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
