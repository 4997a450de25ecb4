// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `terraform.rs`

#[cfg(test)]
mod tests {
    use super::super::TerraformOptions;
    use serde_json::json;

    fn options() -> TerraformOptions {
        let mut options = TerraformOptions::new("/tmp/module");
        options.no_color = true;
        options.set_var("name", json!("test-name"));
        options.set_var("replicas", json!(2));
        options
    }

    #[test]
    fn test_defaults() {
        let options = TerraformOptions::new("/tmp/module");
        assert_eq!(options.terraform_binary, "terraform");
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.time_between_retries.as_secs(), 300);
        assert!(options.retryable_errors.is_empty());
        assert!(!options.no_color);
    }

    #[test]
    fn test_with_default_retryable_errors() {
        let options = TerraformOptions::new("/tmp/module").with_default_retryable_errors();
        assert!(options
            .retryable_errors
            .matching_reason("Error installing provider \"kubernetes\"")
            .is_some());
    }

    #[test]
    fn test_init_args() {
        assert_eq!(options().init_args(), vec!["init", "-upgrade=false", "-no-color"]);
    }

    #[test]
    fn test_apply_args() {
        assert_eq!(
            options().apply_args(),
            vec![
                "apply",
                "-input=false",
                "-auto-approve",
                "-lock=false",
                "-no-color",
                "-var",
                "name=test-name",
                "-var",
                "replicas=2",
            ]
        );
    }

    #[test]
    fn test_destroy_args_with_lock_and_color() {
        let mut options = options();
        options.no_color = false;
        options.lock = true;

        assert_eq!(
            options.destroy_args(),
            vec![
                "destroy",
                "-auto-approve",
                "-input=false",
                "-lock=true",
                "-var",
                "name=test-name",
                "-var",
                "replicas=2",
            ]
        );
    }

    #[test]
    fn test_output_args() {
        assert_eq!(
            options().output_args("service_name"),
            vec!["output", "-json", "-no-color", "service_name"]
        );
    }

    #[cfg(unix)]
    mod with_fake_binary {
        use super::super::super::TerraformOptions;
        use crate::errors::HarnessError;
        use serde_json::json;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use std::time::Duration;

        /// Install a shell script standing in for `terraform` and return its path.
        fn fake_terraform(dir: &Path, body: &str) -> String {
            let path = dir.join("terraform");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().to_string()
        }

        fn options_for(dir: &Path, binary: String) -> TerraformOptions {
            let mut options = TerraformOptions::new(dir).with_default_retryable_errors();
            options.terraform_binary = binary;
            options.time_between_retries = Duration::ZERO;
            options.max_retries = 2;
            options
        }

        #[tokio::test]
        async fn test_init_and_apply_passes_vars() {
            let dir = tempfile::tempdir().unwrap();
            let binary = fake_terraform(dir.path(), "echo \"$@\"");
            let mut options = options_for(dir.path(), binary);
            options.set_var("name", json!("test-name"));

            let output = options.init_and_apply().await.unwrap();

            assert!(output.contains("init -upgrade=false"));
            assert!(output.contains("apply -input=false -auto-approve -lock=false -var name=test-name"));
        }

        #[tokio::test]
        async fn test_transient_error_is_retried() {
            let dir = tempfile::tempdir().unwrap();
            // Fails once with a retryable message, then succeeds
            let binary = fake_terraform(
                dir.path(),
                "if [ ! -f attempted ]; then touch attempted; \
                 echo 'read: connection reset by peer' 1>&2; exit 1; fi; echo applied",
            );
            let options = options_for(dir.path(), binary);

            let output = options.apply().await.unwrap();
            assert!(output.contains("applied"));
        }

        #[tokio::test]
        async fn test_fatal_error_is_not_retried() {
            let dir = tempfile::tempdir().unwrap();
            let binary = fake_terraform(
                dir.path(),
                "echo x >> attempts; echo 'Error: Unsupported argument' 1>&2; exit 1",
            );
            let options = options_for(dir.path(), binary);

            let err = options.destroy().await.unwrap_err();
            assert!(matches!(err, HarnessError::Fatal { .. }));

            let attempts = std::fs::read_to_string(dir.path().join("attempts")).unwrap();
            assert_eq!(attempts.lines().count(), 1);
        }

        #[tokio::test]
        async fn test_output_json() {
            let dir = tempfile::tempdir().unwrap();
            let binary = fake_terraform(dir.path(), "echo '{\"replicas\": 2}'");
            let options = options_for(dir.path(), binary);

            let value = options.output_json("deployment").await.unwrap();
            assert_eq!(value, json!({ "replicas": 2 }));
        }

        #[tokio::test]
        async fn test_output_json_rejects_garbage() {
            let dir = tempfile::tempdir().unwrap();
            let binary = fake_terraform(dir.path(), "echo 'not json'");
            let options = options_for(dir.path(), binary);

            let err = options.output_json("deployment").await.unwrap_err();
            assert!(matches!(err, HarnessError::InvalidOutput { .. }));
        }
    }
}
