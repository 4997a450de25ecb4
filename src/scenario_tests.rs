// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `scenario.rs`

#[cfg(test)]
mod tests {
    use super::super::{default_terraform_options, run_guarded, run_teardown, TeardownStep};
    use crate::config::HarnessConfig;
    use crate::errors::HarnessError;
    use futures::FutureExt;
    use serde_json::json;
    use std::panic::AssertUnwindSafe;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    /// Steps in the order a scenario registers them.
    fn registered_steps() -> Vec<TeardownStep> {
        vec![
            TeardownStep::DeleteNamespace("test-ns-x-abc123".to_string()),
            TeardownStep::KubectlDelete(PathBuf::from("tests/fixtures/resources.yml")),
            TeardownStep::TerraformDestroy,
        ]
    }

    fn step_failure() -> HarnessError {
        HarnessError::CommandFailed {
            command: "kubectl delete".to_string(),
            exit_code: Some(1),
            output: "error: the server doesn't have a resource type".to_string(),
        }
    }

    /// Stand-in for a scenario: records what ran and how many teardown steps fail.
    #[derive(Default)]
    struct Recorder {
        events: Vec<&'static str>,
        teardown_failures: usize,
    }

    async fn record_teardown(state: &mut Recorder) -> usize {
        state.events.push("teardown");
        state.teardown_failures
    }

    #[test]
    fn test_default_options_set_name_and_namespace() {
        let config = HarnessConfig::default();
        let options = default_terraform_options(&config, Path::new("/tmp/m"), "test-ns-x-abc123");

        assert_eq!(options.vars.get("name"), Some(&json!("test-name")));
        assert_eq!(options.vars.get("namespace"), Some(&json!("test-ns-x-abc123")));
        assert_eq!(options.vars.len(), 2);
        assert_eq!(options.terraform_dir, Path::new("/tmp/m"));
    }

    #[test]
    fn test_default_options_retry_policy() {
        let options =
            default_terraform_options(&HarnessConfig::default(), Path::new("/tmp/m"), "ns");

        assert_eq!(options.max_retries, 5);
        assert_eq!(options.time_between_retries, Duration::from_secs(300));
        assert!(options.no_color);
        assert!(options
            .retryable_errors
            .matching_reason("transport is closing")
            .is_some());
    }

    #[test]
    fn test_default_options_follow_config() {
        let config = HarnessConfig {
            terraform_binary: "tofu".to_string(),
            max_retries: 1,
            time_between_retries: Duration::from_secs(3),
            ..Default::default()
        };
        let options = default_terraform_options(&config, Path::new("/tmp/m"), "ns");

        assert_eq!(options.terraform_binary, "tofu");
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.time_between_retries, Duration::from_secs(3));
        assert!(options
            .apply_args()
            .contains(&"namespace=ns".to_string()));
    }

    #[tokio::test]
    async fn test_teardown_runs_in_reverse_registration_order() {
        let mut executed = Vec::new();

        let failures = run_teardown("ns", registered_steps(), |step| {
            executed.push(step);
            async { Ok(()) }
        })
        .await;

        assert_eq!(failures, 0);
        assert_eq!(
            executed,
            vec![
                TeardownStep::TerraformDestroy,
                TeardownStep::KubectlDelete(PathBuf::from("tests/fixtures/resources.yml")),
                TeardownStep::DeleteNamespace("test-ns-x-abc123".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_step_does_not_stop_teardown() {
        let mut executed = Vec::new();

        let failures = run_teardown("ns", registered_steps(), |step| {
            let fails = matches!(
                step,
                TeardownStep::TerraformDestroy | TeardownStep::KubectlDelete(_)
            );
            executed.push(step);
            async move {
                if fails {
                    Err(step_failure())
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(failures, 2);
        assert_eq!(executed.len(), 3, "namespace delete still runs");
        assert!(matches!(
            executed.last(),
            Some(TeardownStep::DeleteNamespace(_))
        ));
    }

    #[tokio::test]
    async fn test_teardown_with_no_steps() {
        let failures = run_teardown("ns", Vec::new(), |_| async { Ok(()) }).await;
        assert_eq!(failures, 0);
    }

    #[tokio::test]
    async fn test_clean_run_tears_down_and_succeeds() {
        let mut state = Recorder::default();

        let result = run_guarded(
            &mut state,
            "clean",
            |s| {
                Box::pin(async move {
                    s.events.push("body");
                    Ok::<_, anyhow::Error>(())
                })
            },
            |s| Box::pin(record_teardown(s)),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state.events, vec!["body", "teardown"]);
    }

    #[tokio::test]
    async fn test_teardown_failures_fail_a_clean_run() {
        let mut state = Recorder {
            teardown_failures: 2,
            ..Default::default()
        };

        let result = run_guarded(
            &mut state,
            "leaky",
            |_| Box::pin(async { Ok::<_, anyhow::Error>(()) }),
            |s| Box::pin(record_teardown(s)),
        )
        .await;

        let message = result.unwrap_err().to_string();
        assert!(message.contains("2 teardown step(s) failed"), "{message}");
        assert!(message.contains("leaky"), "{message}");
    }

    #[tokio::test]
    async fn test_body_error_wins_over_teardown_failures() {
        let mut state = Recorder {
            teardown_failures: 1,
            ..Default::default()
        };

        let result = run_guarded(
            &mut state,
            "broken",
            |_| Box::pin(async { Err::<(), _>(anyhow::anyhow!("terraform apply failed")) }),
            |s| Box::pin(record_teardown(s)),
        )
        .await;

        assert_eq!(result.unwrap_err().to_string(), "terraform apply failed");
        assert_eq!(state.events, vec!["teardown"]);
    }

    #[tokio::test]
    async fn test_panic_in_body_is_resumed_after_teardown() {
        let mut state = Recorder::default();

        let outcome = AssertUnwindSafe(run_guarded(
            &mut state,
            "panicky",
            |s| {
                Box::pin(async move {
                    s.events.push("body");
                    if s.events.len() == 1 {
                        panic!("assertion failed: pods.len() == 2");
                    }
                    Ok::<_, anyhow::Error>(())
                })
            },
            |s| Box::pin(record_teardown(s)),
        ))
        .catch_unwind()
        .await;

        let panic = outcome.unwrap_err();
        assert_eq!(
            panic.downcast_ref::<&str>().copied(),
            Some("assertion failed: pods.len() == 2")
        );
        assert_eq!(state.events, vec!["body", "teardown"]);
    }
}
