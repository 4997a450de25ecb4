// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Readers for the pod fields the acceptance tests assert on.
//!
//! Every helper tolerates absent optional fields and returns an empty value
//! instead of panicking, so a failed assertion reports what was actually there.

use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

/// Image of the first container in the pod spec.
#[must_use]
pub fn first_container_image(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()?
        .containers
        .first()?
        .image
        .as_deref()
}

/// Images of all containers, in spec order.
#[must_use]
pub fn container_images(pod: &Pod) -> Vec<&str> {
    pod.spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .filter_map(|c| c.image.as_deref())
                .collect()
        })
        .unwrap_or_default()
}

/// Pod annotations, or an empty map.
#[must_use]
pub fn annotations(pod: &Pod) -> BTreeMap<String, String> {
    pod.metadata.annotations.clone().unwrap_or_default()
}

/// First match-expression key of each required node-selector term.
#[must_use]
pub fn required_node_affinity_keys(pod: &Pod) -> Vec<String> {
    pod.spec
        .as_ref()
        .and_then(|s| s.affinity.as_ref())
        .and_then(|a| a.node_affinity.as_ref())
        .and_then(|na| {
            na.required_during_scheduling_ignored_during_execution
                .as_ref()
        })
        .map(|selector| {
            selector
                .node_selector_terms
                .iter()
                .filter_map(|term| term.match_expressions.as_ref()?.first())
                .map(|expr| expr.key.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Weights of the preferred node-affinity terms.
#[must_use]
pub fn preferred_node_affinity_weights(pod: &Pod) -> Vec<i32> {
    pod.spec
        .as_ref()
        .and_then(|s| s.affinity.as_ref())
        .and_then(|a| a.node_affinity.as_ref())
        .and_then(|na| {
            na.preferred_during_scheduling_ignored_during_execution
                .as_ref()
        })
        .map(|terms| terms.iter().map(|t| t.weight).collect())
        .unwrap_or_default()
}

/// Host aliases as `(ip, hostnames)` pairs.
#[must_use]
pub fn host_aliases(pod: &Pod) -> Vec<(String, Vec<String>)> {
    pod.spec
        .as_ref()
        .and_then(|s| s.host_aliases.as_ref())
        .map(|aliases| {
            aliases
                .iter()
                .map(|a| (a.ip.clone(), a.hostnames.clone().unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default()
}

/// Names of the image pull secrets referenced by the pod.
#[must_use]
pub fn image_pull_secret_names(pod: &Pod) -> Vec<String> {
    pod.spec
        .as_ref()
        .and_then(|s| s.image_pull_secrets.as_ref())
        .map(|secrets| secrets.iter().map(|s| s.name.clone()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "assertions_tests.rs"]
mod assertions_tests;
