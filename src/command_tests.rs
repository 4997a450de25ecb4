// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `command.rs`

#[cfg(all(test, unix))]
mod tests {
    use super::super::{run_command, CommandSpec};
    use crate::errors::HarnessError;
    use std::collections::BTreeMap;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_display() {
        let spec = CommandSpec::new(
            "terraform",
            vec!["init".to_string(), "-upgrade=false".to_string()],
        );
        assert_eq!(spec.display(), "terraform init -upgrade=false");
    }

    #[tokio::test]
    async fn test_combines_stdout_and_stderr() {
        let output = run_command(&sh("echo out; echo err 1>&2")).await.unwrap();
        assert_eq!(output, "out\nerr\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_output() {
        let err = run_command(&sh("echo 'Error: boom' 1>&2; exit 3"))
            .await
            .unwrap_err();

        match err {
            HarnessError::CommandFailed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(output.contains("Error: boom"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let spec = CommandSpec::new("tfkube-no-such-binary", vec![]);
        let err = run_command(&spec).await.unwrap_err();
        assert!(matches!(
            err,
            HarnessError::CommandFailed {
                exit_code: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("TFKUBE_TEST_VALUE".to_string(), "hello".to_string());

        let spec = sh("echo $TFKUBE_TEST_VALUE; pwd")
            .in_dir(dir.path())
            .with_env(&env);
        let output = run_command(&spec).await.unwrap();

        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("hello"));
        let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(pwd, std::fs::canonicalize(dir.path()).unwrap());
    }
}
