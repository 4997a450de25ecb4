// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes access for test scenarios.
//!
//! Namespace lifecycle and pod queries go through the Kubernetes API with
//! `kube`. Static manifests are applied with `kubectl` so the harness never
//! has to translate YAML into API calls itself.

use crate::command::{run_command, CommandSpec};
use crate::config::HarnessConfig;
use crate::constants::{
    DEFAULT_KUBECTL_BINARY, HTTP_CONFLICT, HTTP_NOT_FOUND, LABEL_MANAGED_BY, LABEL_TEST,
    MANAGED_BY_VALUE, TEST_LABEL_VALUE,
};
use crate::errors::{HarnessError, Result};
use crate::retry::retry_api_call;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::wait::await_condition;
use kube::{Client, Config};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How to reach the cluster and which namespace to work in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KubectlOptions {
    /// Kubeconfig context; `None` uses the current context
    pub context_name: Option<String>,
    /// Kubeconfig path; `None` uses the default lookup
    pub config_path: Option<PathBuf>,
    pub namespace: String,
    pub kubectl_binary: String,
}

impl KubectlOptions {
    /// Build options where empty strings mean "use the default".
    #[must_use]
    pub fn new(context_name: &str, config_path: &str, namespace: &str) -> Self {
        Self {
            context_name: (!context_name.is_empty()).then(|| context_name.to_string()),
            config_path: (!config_path.is_empty()).then(|| PathBuf::from(config_path)),
            namespace: namespace.to_string(),
            kubectl_binary: DEFAULT_KUBECTL_BINARY.to_string(),
        }
    }

    /// Build options from the harness configuration.
    #[must_use]
    pub fn from_config(config: &HarnessConfig, namespace: &str) -> Self {
        Self {
            context_name: config.kube_context.clone(),
            config_path: config.kubeconfig.clone(),
            namespace: namespace.to_string(),
            kubectl_binary: config.kubectl_binary.clone(),
        }
    }

    /// Global kubectl flags followed by `args`.
    #[must_use]
    pub fn kubectl_args(&self, args: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(context) = &self.context_name {
            out.push("--context".to_string());
            out.push(context.clone());
        }
        if let Some(path) = &self.config_path {
            out.push("--kubeconfig".to_string());
            out.push(path.display().to_string());
        }
        if !self.namespace.is_empty() {
            out.push("--namespace".to_string());
            out.push(self.namespace.clone());
        }
        out.extend(args.iter().map(|a| (*a).to_string()));
        out
    }
}

/// Build a client for the cluster described by `options`.
///
/// # Errors
///
/// Returns an error if the kubeconfig cannot be read or the client cannot be built.
pub async fn client(options: &KubectlOptions) -> Result<Client> {
    if options.context_name.is_none() && options.config_path.is_none() {
        return Ok(Client::try_default().await?);
    }

    let kube_options = KubeConfigOptions {
        context: options.context_name.clone(),
        ..Default::default()
    };

    let config = match &options.config_path {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &kube_options).await?
        }
        None => Config::from_kubeconfig(&kube_options).await?,
    };

    Ok(Client::try_from(config)?)
}

/// Namespace object carrying the harness labels.
#[must_use]
pub fn test_namespace(name: &str) -> Namespace {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_TEST.to_string(), TEST_LABEL_VALUE.to_string());
    labels.insert(LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string());

    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Create a test namespace. An existing namespace counts as success.
///
/// # Errors
///
/// Returns an error for any API failure other than 409 Conflict.
pub async fn create_namespace(client: &Client, name: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = test_namespace(name);
    let pp = PostParams::default();

    match retry_api_call(|| namespaces.create(&pp, &ns), "create namespace").await {
        Ok(_) => {
            info!(namespace = name, "Created test namespace");
            Ok(())
        }
        Err(HarnessError::Kube(kube::Error::Api(ae))) if ae.code == HTTP_CONFLICT => {
            info!(namespace = name, "Test namespace already exists");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Delete a test namespace. A missing namespace counts as success.
///
/// # Errors
///
/// Returns an error for any API failure other than 404 Not Found.
pub async fn delete_namespace(client: &Client, name: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let dp = DeleteParams::default();

    match retry_api_call(|| namespaces.delete(name, &dp), "delete namespace").await {
        Ok(_) => {
            info!(namespace = name, "Deleted test namespace");
            Ok(())
        }
        Err(HarnessError::Kube(kube::Error::Api(ae))) if ae.code == HTTP_NOT_FOUND => {
            info!(namespace = name, "Test namespace already deleted");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// `kubectl apply -f <path>` in the options' namespace.
///
/// # Errors
///
/// Returns [`HarnessError::CommandFailed`] if kubectl exits non-zero.
pub async fn kubectl_apply(options: &KubectlOptions, path: &Path) -> Result<String> {
    let path = path.display().to_string();
    let spec = CommandSpec::new(
        &options.kubectl_binary,
        options.kubectl_args(&["apply", "-f", path.as_str()]),
    );
    run_command(&spec).await
}

/// `kubectl delete -f <path> --ignore-not-found` in the options' namespace.
///
/// # Errors
///
/// Returns [`HarnessError::CommandFailed`] if kubectl exits non-zero.
pub async fn kubectl_delete(options: &KubectlOptions, path: &Path) -> Result<String> {
    let path = path.display().to_string();
    let spec = CommandSpec::new(
        &options.kubectl_binary,
        options.kubectl_args(&["delete", "-f", path.as_str(), "--ignore-not-found"]),
    );
    run_command(&spec).await
}

/// List pods in `namespace` matching `label_selector`.
///
/// # Errors
///
/// Returns an error if the API call fails after retries.
pub async fn list_pods(client: &Client, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let lp = ListParams::default().labels(label_selector);

    let list = retry_api_call(|| pods.list(&lp), "list pods").await?;
    debug!(
        namespace = namespace,
        selector = label_selector,
        count = list.items.len(),
        "Listed pods"
    );
    Ok(list.items)
}

/// Poll until exactly `expected` pods match `label_selector`.
///
/// # Errors
///
/// Returns [`HarnessError::Timeout`] if the count never matches within
/// `retries` polls.
pub async fn wait_until_num_pods_created(
    client: &Client,
    namespace: &str,
    label_selector: &str,
    expected: usize,
    retries: usize,
    sleep_between: Duration,
) -> Result<Vec<Pod>> {
    let what = format!("{expected} pods matching '{label_selector}' in {namespace}");
    poll_pod_count(&what, expected, retries, sleep_between, || {
        list_pods(client, namespace, label_selector)
    })
    .await
}

/// Call `list` up to `retries` times until it returns `expected` pods.
///
/// There is no sleep after the last poll.
pub(crate) async fn poll_pod_count<F, Fut>(
    what: &str,
    expected: usize,
    retries: usize,
    sleep_between: Duration,
    mut list: F,
) -> Result<Vec<Pod>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Pod>>>,
{
    let start = Instant::now();
    let retries = retries.max(1);

    for attempt in 1..=retries {
        let pods = list().await?;
        if pods.len() == expected {
            return Ok(pods);
        }
        debug!(
            attempt = attempt,
            found = pods.len(),
            expected = expected,
            "Waiting for {what}"
        );
        if attempt < retries {
            tokio::time::sleep(sleep_between).await;
        }
    }

    warn!(retries = retries, "Gave up waiting for {what}");
    Err(HarnessError::Timeout {
        what: what.to_string(),
        elapsed: start.elapsed(),
    })
}

/// Whether a pod is running with every container ready.
#[must_use]
pub fn pod_is_available(pod: &Pod) -> bool {
    let Some(status) = &pod.status else {
        return false;
    };
    if status.phase.as_deref() != Some("Running") {
        return false;
    }
    status
        .container_statuses
        .as_ref()
        .is_some_and(|statuses| !statuses.is_empty() && statuses.iter().all(|c| c.ready))
}

/// Watch a pod until it is available or `timeout` elapses.
///
/// # Errors
///
/// Returns [`HarnessError::Timeout`] on timeout, or the watch error.
pub async fn wait_until_pod_available(
    client: &Client,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let cond = |pod: Option<&Pod>| pod.is_some_and(pod_is_available);

    match tokio::time::timeout(timeout, await_condition(pods, name, cond)).await {
        Ok(result) => {
            result?;
            info!(namespace = namespace, pod = name, "Pod available");
            Ok(())
        }
        Err(_) => Err(HarnessError::Timeout {
            what: format!("pod {namespace}/{name} to become available"),
            elapsed: timeout,
        }),
    }
}

#[cfg(test)]
#[path = "k8s_tests.rs"]
mod k8s_tests;
