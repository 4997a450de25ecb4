// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-test lifecycle for Terraform-on-Kubernetes acceptance tests.
//!
//! A [`Scenario`] owns one temporary module copy and one uniquely named
//! namespace. Every resource it creates registers a teardown step, and
//! [`run_scenario`] runs those steps in reverse order even when the test body
//! panics on a failed assertion.
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tfkube::scenario::{run_scenario, Scenario};
//!
//! async fn two_replicas(scenario: &mut Scenario) -> anyhow::Result<()> {
//!     scenario.apply_default_resources().await?;
//!     scenario.options.set_var("replicas", json!(2));
//!     scenario.init_and_apply().await?;
//!
//!     let pods = scenario.wait_for_workload_pods(2).await?;
//!     assert_eq!(pods.len(), 2);
//!     Ok(())
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! run_scenario("two-replicas", |s| Box::pin(two_replicas(s))).await
//! # }
//! ```

use crate::config::HarnessConfig;
use crate::constants::{
    DEFAULT_POD_WAIT_RETRIES, DEFAULT_POD_WAIT_SLEEP_SECS, DEFAULT_WORKLOAD_NAME,
    WORKLOAD_LABEL_SELECTOR,
};
use crate::k8s::{self, KubectlOptions};
use crate::random::unique_namespace;
use crate::terraform::TerraformOptions;
use crate::test_structure::{copy_terraform_folder_to_temp, TempModule};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;
use serde_json::json;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Cleanup registered while a scenario runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TeardownStep {
    DeleteNamespace(String),
    KubectlDelete(PathBuf),
    TerraformDestroy,
}

/// State shared by the steps of one acceptance test.
pub struct Scenario {
    pub config: HarnessConfig,
    pub namespace: String,
    pub kubectl: KubectlOptions,
    /// Terraform options; tests add their variables here before applying
    pub options: TerraformOptions,
    pub client: Client,
    module: TempModule,
    cleanup: Vec<TeardownStep>,
}

/// Terraform options every scenario starts from.
#[must_use]
pub fn default_terraform_options(
    config: &HarnessConfig,
    terraform_dir: &Path,
    namespace: &str,
) -> TerraformOptions {
    let mut options = TerraformOptions::new(terraform_dir).with_default_retryable_errors();
    options.terraform_binary = config.terraform_binary.clone();
    options.max_retries = config.max_retries;
    options.time_between_retries = config.time_between_retries;
    options.no_color = true;
    options.set_var("name", json!(DEFAULT_WORKLOAD_NAME));
    options.set_var("namespace", json!(namespace));
    options
}

impl Scenario {
    /// Copy the module, create a unique namespace and build default options.
    ///
    /// # Errors
    ///
    /// Fails if no module root is configured, the copy fails, or the cluster
    /// cannot be reached.
    pub async fn setup(suffix: &str, config: HarnessConfig) -> Result<Self> {
        let module_root = config
            .module_root
            .clone()
            .context("no Terraform module configured (set TFKUBE_MODULE_DIR)")?;

        let mut module = copy_terraform_folder_to_temp(&module_root, Path::new("."))
            .context("failed to copy Terraform module")?;
        if config.keep_temp {
            module.keep();
        }

        let namespace = unique_namespace(suffix);
        let options = default_terraform_options(&config, module.terraform_dir(), &namespace);
        let kubectl = KubectlOptions::from_config(&config, &namespace);
        let client = k8s::client(&kubectl)
            .await
            .context("failed to build Kubernetes client")?;

        let mut scenario = Self {
            config,
            namespace,
            kubectl,
            options,
            client,
            module,
            cleanup: Vec::new(),
        };

        k8s::create_namespace(&scenario.client, &scenario.namespace)
            .await
            .with_context(|| format!("failed to create namespace {}", scenario.namespace))?;
        scenario
            .cleanup
            .push(TeardownStep::DeleteNamespace(scenario.namespace.clone()));

        info!(
            namespace = %scenario.namespace,
            dir = %scenario.module.terraform_dir().display(),
            "Scenario ready"
        );
        Ok(scenario)
    }

    /// Directory Terraform runs in.
    #[must_use]
    pub fn terraform_dir(&self) -> &Path {
        self.module.terraform_dir()
    }

    /// Apply a static manifest into the scenario namespace.
    ///
    /// Deletion is registered before applying, so a partially applied manifest
    /// is still cleaned up.
    ///
    /// # Errors
    ///
    /// Fails if `kubectl apply` fails.
    pub async fn apply_resources(&mut self, path: &Path) -> Result<()> {
        self.cleanup
            .push(TeardownStep::KubectlDelete(path.to_path_buf()));
        k8s::kubectl_apply(&self.kubectl, path)
            .await
            .with_context(|| format!("kubectl apply -f {} failed", path.display()))?;
        Ok(())
    }

    /// Apply the configured fixture manifest.
    ///
    /// # Errors
    ///
    /// See [`Scenario::apply_resources`].
    pub async fn apply_default_resources(&mut self) -> Result<()> {
        let path = self.config.resources_path.clone();
        self.apply_resources(&path).await
    }

    /// Run `terraform init` and `terraform apply`, registering destroy first.
    ///
    /// # Errors
    ///
    /// Fails if init or apply fails after retries.
    pub async fn init_and_apply(&mut self) -> Result<String> {
        self.cleanup.push(TeardownStep::TerraformDestroy);
        self.options
            .init_and_apply()
            .await
            .context("terraform init and apply failed")
    }

    /// Pods in the scenario namespace matching `label_selector`.
    ///
    /// # Errors
    ///
    /// Fails if the pod list cannot be read.
    pub async fn pods(&self, label_selector: &str) -> Result<Vec<Pod>> {
        Ok(k8s::list_pods(&self.client, &self.namespace, label_selector).await?)
    }

    /// Wait until exactly `expected` workload pods exist and are available,
    /// then return their current state.
    ///
    /// # Errors
    ///
    /// Fails if the count does not settle or a pod never becomes ready.
    pub async fn wait_for_workload_pods(&self, expected: usize) -> Result<Vec<Pod>> {
        let sleep_between = Duration::from_secs(DEFAULT_POD_WAIT_SLEEP_SECS);
        let created = k8s::wait_until_num_pods_created(
            &self.client,
            &self.namespace,
            WORKLOAD_LABEL_SELECTOR,
            expected,
            DEFAULT_POD_WAIT_RETRIES,
            sleep_between,
        )
        .await?;

        let timeout = sleep_between * u32::try_from(DEFAULT_POD_WAIT_RETRIES).unwrap_or(u32::MAX);
        for pod in &created {
            let Some(name) = pod.metadata.name.as_deref() else {
                continue;
            };
            k8s::wait_until_pod_available(&self.client, &self.namespace, name, timeout)
                .await
                .with_context(|| format!("pod {name} never became available"))?;
        }

        self.pods(WORKLOAD_LABEL_SELECTOR).await
    }

    /// Run every registered teardown step in reverse order.
    ///
    /// A failing step is logged and the remaining steps still run. Returns the
    /// number of failed steps.
    pub async fn teardown(&mut self) -> usize {
        let steps = std::mem::take(&mut self.cleanup);
        let options = &self.options;
        let kubectl = &self.kubectl;
        let client = &self.client;

        run_teardown(&self.namespace, steps, move |step| async move {
            match step {
                TeardownStep::TerraformDestroy => options.destroy().await.map(|_| ()),
                TeardownStep::KubectlDelete(path) => {
                    k8s::kubectl_delete(kubectl, &path).await.map(|_| ())
                }
                TeardownStep::DeleteNamespace(name) => k8s::delete_namespace(client, &name).await,
            }
        })
        .await
    }
}

/// Pop `steps` from the end and hand each one to `execute`.
///
/// Every step runs even when an earlier one fails. Returns the number of
/// failed steps.
pub async fn run_teardown<F, Fut>(
    namespace: &str,
    mut steps: Vec<TeardownStep>,
    mut execute: F,
) -> usize
where
    F: FnMut(TeardownStep) -> Fut,
    Fut: Future<Output = crate::errors::Result<()>>,
{
    let mut failures = 0;

    while let Some(step) = steps.pop() {
        info!(namespace = namespace, step = ?step, "Teardown");
        if let Err(e) = execute(step.clone()).await {
            failures += 1;
            error!(namespace = namespace, step = ?step, error = %e, "Teardown step failed");
        }
    }

    failures
}

/// Set up a scenario, run `body`, and always tear down.
///
/// If no module root is configured the scenario is skipped. A panic in `body`
/// is re-raised after teardown.
///
/// # Errors
///
/// Returns the body's error, a setup error, or a teardown failure.
pub async fn run_scenario<F>(suffix: &str, body: F) -> Result<()>
where
    F: for<'a> FnOnce(&'a mut Scenario) -> BoxFuture<'a, Result<()>>,
{
    crate::logging::init();

    let config = HarnessConfig::from_env().context("invalid harness configuration")?;
    if config.module_root.is_none() {
        warn!(scenario = suffix, "Skipping scenario: TFKUBE_MODULE_DIR is not set");
        return Ok(());
    }

    let mut scenario = Scenario::setup(suffix, config).await?;
    run_guarded(&mut scenario, suffix, body, |s| Box::pin(s.teardown())).await
}

/// Run `body` on `state`, then `teardown`, even if `body` panics.
///
/// A panic is resumed once teardown has finished. Otherwise the body's error
/// wins, and a clean body still fails when teardown reported failures.
pub(crate) async fn run_guarded<S, B, T>(
    state: &mut S,
    suffix: &str,
    body: B,
    teardown: T,
) -> Result<()>
where
    B: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, Result<()>>,
    T: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, usize>,
{
    let outcome = AssertUnwindSafe(body(&mut *state)).catch_unwind().await;
    let failures = teardown(state).await;

    match outcome {
        Err(panic) => std::panic::resume_unwind(panic),
        Ok(Err(e)) => Err(e),
        Ok(Ok(())) if failures > 0 => {
            anyhow::bail!("{failures} teardown step(s) failed for scenario {suffix}")
        }
        Ok(Ok(())) => Ok(()),
    }
}

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod scenario_tests;
