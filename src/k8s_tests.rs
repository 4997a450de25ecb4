// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `k8s.rs`

#[cfg(test)]
mod tests {
    use super::super::{poll_pod_count, pod_is_available, test_namespace, KubectlOptions};
    use crate::config::HarnessConfig;
    use crate::errors::HarnessError;
    use k8s_openapi::api::core::v1::{ContainerStatus, Pod, PodStatus};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn pod_with_status(phase: &str, ready: &[bool]) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                container_statuses: Some(
                    ready
                        .iter()
                        .enumerate()
                        .map(|(i, r)| ContainerStatus {
                            name: format!("c{i}"),
                            ready: *r,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_treats_empty_strings_as_defaults() {
        let options = KubectlOptions::new("", "", "test-ns-abc");
        assert_eq!(options.context_name, None);
        assert_eq!(options.config_path, None);
        assert_eq!(options.namespace, "test-ns-abc");
        assert_eq!(options.kubectl_binary, "kubectl");
    }

    #[test]
    fn test_kubectl_args_without_overrides() {
        let options = KubectlOptions::new("", "", "test-ns-abc");
        assert_eq!(
            options.kubectl_args(&["apply", "-f", "resources.yml"]),
            vec!["--namespace", "test-ns-abc", "apply", "-f", "resources.yml"]
        );
    }

    #[test]
    fn test_kubectl_args_with_context_and_kubeconfig() {
        let options = KubectlOptions::new("kind-test", "/tmp/kubeconfig", "ns");
        assert_eq!(
            options.kubectl_args(&["delete", "-f", "r.yml", "--ignore-not-found"]),
            vec![
                "--context",
                "kind-test",
                "--kubeconfig",
                "/tmp/kubeconfig",
                "--namespace",
                "ns",
                "delete",
                "-f",
                "r.yml",
                "--ignore-not-found",
            ]
        );
    }

    #[test]
    fn test_from_config() {
        let config = HarnessConfig {
            kube_context: Some("ctx".to_string()),
            kubeconfig: Some(PathBuf::from("/kube/config")),
            kubectl_binary: "/usr/local/bin/kubectl".to_string(),
            ..Default::default()
        };
        let options = KubectlOptions::from_config(&config, "ns");

        assert_eq!(options.context_name.as_deref(), Some("ctx"));
        assert_eq!(options.config_path, Some(PathBuf::from("/kube/config")));
        assert_eq!(options.kubectl_binary, "/usr/local/bin/kubectl");
    }

    #[test]
    fn test_namespace_labels() {
        let ns = test_namespace("test-ns-x-abc123");
        assert_eq!(ns.metadata.name.as_deref(), Some("test-ns-x-abc123"));

        let labels = ns.metadata.labels.unwrap();
        assert_eq!(labels.get("test").map(String::as_str), Some("integration"));
        assert_eq!(labels.get("managed-by").map(String::as_str), Some("tfkube"));
    }

    #[test]
    fn test_pod_is_available() {
        assert!(pod_is_available(&pod_with_status("Running", &[true, true])));
        assert!(!pod_is_available(&pod_with_status("Running", &[true, false])));
        assert!(!pod_is_available(&pod_with_status("Pending", &[true])));
        assert!(!pod_is_available(&pod_with_status("Running", &[])));
        assert!(!pod_is_available(&Pod::default()));
    }

    #[tokio::test]
    async fn test_poll_pod_count_returns_once_count_matches() {
        let mut calls: usize = 0;

        let pods = poll_pod_count("2 pods", 2, 5, Duration::ZERO, || {
            calls += 1;
            let found = calls.min(2);
            async move { Ok(vec![Pod::default(); found]) }
        })
        .await
        .unwrap();

        assert_eq!(pods.len(), 2);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_poll_pod_count_does_not_sleep_after_last_attempt() {
        let mut calls = 0;
        let start = Instant::now();

        let result = poll_pod_count("1 pod", 1, 1, Duration::from_secs(5), || {
            calls += 1;
            async { Ok(Vec::new()) }
        })
        .await;

        assert!(matches!(result, Err(HarnessError::Timeout { .. })));
        assert_eq!(calls, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_poll_pod_count_propagates_list_errors() {
        let result = poll_pod_count("1 pod", 1, 3, Duration::ZERO, || async {
            Err(HarnessError::Config("no cluster".to_string()))
        })
        .await;

        assert!(matches!(result, Err(HarnessError::Config(_))));
    }
}
