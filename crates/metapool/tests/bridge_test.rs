//! Engine protocol tests against a shell stand-in for the R runner.
//!
//! `sh` gives us full control over exit codes, streams and result files
//! without requiring an R installation, so every branch of the execution
//! protocol is exercised.

use std::path::PathBuf;
use std::time::Duration;

use metapool::bridge::{EngineConfig, REngine, RenderedScript, TempFileGuard};
use metapool::MetaPoolError;

fn shell_engine() -> REngine {
    REngine::with_config(EngineConfig {
        runner: PathBuf::from("sh"),
        timeout: None,
    })
}

fn shell_script(body: &str) -> RenderedScript {
    RenderedScript::new("shell_test", body.to_string(), None)
}

#[tokio::test]
async fn test_missing_runner_is_engine_not_found() {
    let engine = REngine::with_config(EngineConfig {
        runner: PathBuf::from("/nonexistent/metapool-rscript"),
        timeout: None,
    });

    let err = engine.execute(shell_script("exit 0")).await.unwrap_err();
    match err {
        MetaPoolError::EngineNotFound { runner, .. } => {
            assert!(runner.contains("metapool-rscript"));
        }
        other => panic!("expected EngineNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nonzero_exit_carries_code_and_stderr() {
    let engine = shell_engine();
    let script = shell_script("echo boom >&2\nexit 2");
    let script_path = script.script_path().to_path_buf();

    let err = engine.execute(script).await.unwrap_err();
    match err {
        MetaPoolError::EngineRuntime { code, stderr } => {
            assert_eq!(code, 2);
            assert!(stderr.contains("boom"));
        }
        other => panic!("expected EngineRuntime, got {other:?}"),
    }

    // The script temp file is removed even on the failure path.
    assert!(!script_path.exists());
}

#[tokio::test]
async fn test_result_file_is_read_and_removed() {
    let engine = shell_engine();
    let result_file = TempFileGuard::new("shell_result", "json");
    let result_path = result_file.path().to_path_buf();
    let script = RenderedScript::new(
        "shell_test",
        format!("printf '{{\"x\": 1}}' > {}", result_path.display()),
        Some(result_file),
    );

    let value = engine.execute(script).await.expect("Execution failed");
    assert_eq!(value["x"], 1);
    assert!(!result_path.exists());
}

#[tokio::test]
async fn test_success_without_result_file_falls_back_to_stdout() {
    let engine = shell_engine();
    let script = shell_script("echo hello\necho world");

    let value = engine.execute(script).await.expect("Execution failed");
    assert_eq!(value["success"], true);
    assert_eq!(value["output"], "hello\nworld\n");
}

#[tokio::test]
async fn test_missing_result_file_falls_back_to_stdout() {
    let engine = shell_engine();
    let result_file = TempFileGuard::new("never_written", "json");
    let script = RenderedScript::new(
        "shell_test",
        "echo partial output".to_string(),
        Some(result_file),
    );

    let value = engine.execute(script).await.expect("Execution failed");
    assert_eq!(value["success"], true);
    assert_eq!(value["output"], "partial output\n");
}

#[tokio::test]
async fn test_timeout_kills_the_child() {
    let engine = REngine::with_config(EngineConfig {
        runner: PathBuf::from("sh"),
        timeout: Some(Duration::from_millis(200)),
    });

    let err = engine.execute(shell_script("sleep 30")).await.unwrap_err();
    assert!(matches!(err, MetaPoolError::EngineTimeout(_)));
}

#[tokio::test]
async fn test_concurrent_executions_are_isolated() {
    let engine = shell_engine();

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let result_file = TempFileGuard::new("concurrent", "json");
            let script = RenderedScript::new(
                "shell_test",
                format!(
                    "printf '{{\"id\": {i}}}' > {}",
                    result_file.path().display()
                ),
                Some(result_file),
            );
            (i, engine.execute(script).await)
        }));
    }

    for handle in handles {
        let (i, result) = handle.await.expect("Task panicked");
        let value = result.expect("Execution failed");
        assert_eq!(value["id"], i);
    }
}

#[tokio::test]
async fn test_package_probe_degrades_to_all_false() {
    let engine = REngine::with_config(EngineConfig {
        runner: PathBuf::from("/nonexistent/metapool-rscript"),
        timeout: None,
    });

    let availability = engine.check_packages(&["metafor", "meta", "jsonlite"]).await;
    assert_eq!(availability.len(), 3);
    assert!(availability.values().all(|available| !available));
}
