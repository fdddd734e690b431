//! Subprocess execution of engine scripts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{MetaPoolError, Result};

use super::script::{self, RenderedScript};

/// Engine configuration, immutable once the engine is constructed.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The script runner binary, resolved via PATH if relative.
    pub runner: PathBuf,
    /// Optional hard limit on a script's runtime. When exceeded the child
    /// process is killed and the call resolves to `EngineTimeout`. No limit
    /// is enforced by default.
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runner: PathBuf::from("Rscript"),
            timeout: None,
        }
    }
}

/// Executes R scripts in a child process and exchanges results through
/// uniquely named temporary files.
///
/// Invocations hold no shared mutable state, so any number may run
/// concurrently; each uses its own script and result files.
#[derive(Debug, Clone, Default)]
pub struct REngine {
    config: EngineConfig,
}

impl REngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a rendered script and return its JSON result.
    ///
    /// Exit code 0 with a parseable result file yields that file's JSON.
    /// Exit code 0 without one degrades to `{"output": <stdout>, "success":
    /// true}`. A nonzero exit yields `EngineRuntime` with the full stderr
    /// text; a runner that cannot be started yields `EngineNotFound`. The
    /// script and result temp files are removed on every path.
    pub async fn execute(&self, script: RenderedScript) -> Result<Value> {
        let script_path = script.script_path().to_path_buf();
        tokio::fs::write(&script_path, script.body())
            .await
            .map_err(|e| MetaPoolError::Io {
                path: script_path.clone(),
                source: e,
            })?;

        info!(
            procedure = script.procedure(),
            script = %script_path.display(),
            "executing engine script"
        );

        let mut child = Command::new(&self.config.runner)
            .arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MetaPoolError::EngineNotFound {
                runner: self.config.runner.to_string_lossy().into_owned(),
                source: e,
            })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let procedure = script.procedure();

        let run = async {
            tokio::join!(
                drain(stdout_pipe, procedure, "stdout"),
                drain(stderr_pipe, procedure, "stderr"),
                child.wait()
            )
        };

        let (stdout, stderr, status) = match self.config.timeout {
            Some(limit) => match timeout(limit, run).await {
                Ok(finished) => finished,
                Err(_) => {
                    let _ = child.start_kill();
                    warn!(procedure, ?limit, "engine script timed out, child killed");
                    return Err(MetaPoolError::EngineTimeout(limit));
                }
            },
            None => run.await,
        };

        let status = status.map_err(|e| MetaPoolError::Io {
            path: script_path.clone(),
            source: e,
        })?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            debug!(procedure, code, "engine script failed");
            return Err(MetaPoolError::EngineRuntime { code, stderr });
        }

        if let Some(result_path) = script.result_path() {
            match tokio::fs::read_to_string(result_path).await {
                Ok(text) => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => return Ok(value),
                    Err(e) => {
                        warn!(
                            procedure,
                            error = %e,
                            "result file not parseable, falling back to stdout"
                        );
                    }
                },
                Err(e) => {
                    warn!(
                        procedure,
                        error = %e,
                        "expected result file missing, falling back to stdout"
                    );
                }
            }
        }

        Ok(json!({ "output": stdout, "success": true }))
    }

    /// Check whether the named add-on packages are importable by the engine.
    ///
    /// Never errors: an unavailable engine, a failing probe script or an
    /// unparseable probe result all degrade to an all-false map.
    pub async fn check_packages(&self, packages: &[&str]) -> HashMap<String, bool> {
        let all_false = || {
            packages
                .iter()
                .map(|p| (p.to_string(), false))
                .collect::<HashMap<_, _>>()
        };

        let script = match script::package_probe(packages) {
            Ok(script) => script,
            Err(e) => {
                debug!(error = %e, "package probe could not be rendered");
                return all_false();
            }
        };

        match self.execute(script).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|_| all_false()),
            Err(e) => {
                debug!(error = %e, "package probe failed");
                all_false()
            }
        }
    }
}

/// Consume a child stream line by line, accumulating as output arrives.
async fn drain(
    pipe: Option<impl AsyncRead + Unpin>,
    procedure: &str,
    stream: &str,
) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };

    let mut lines = BufReader::new(pipe).lines();
    let mut buffer = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(procedure, stream, line = %line, "engine output");
        buffer.push_str(&line);
        buffer.push('\n');
    }
    buffer
}
