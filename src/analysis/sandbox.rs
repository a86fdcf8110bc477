// src/analysis/sandbox.rs — Sandboxed subprocess for analysis snippets
//
// The high-power analysis path: an agent-supplied Python snippet runs in a
// freshly spawned subprocess under a hard wall-clock limit. The harness
// exposes only the session and master dataset file paths (read-only input);
// anything the snippet should hand back must go through stdout, which is
// capped before it re-enters the model's context.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::util::truncate_str;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Timeout: analysis exceeded {limit_secs}s wall-clock limit")]
    Timeout { limit_secs: u64 },

    #[error("Process exited with code {code}: {stderr}")]
    Exited { code: i32, stderr: String },

    #[error("Failed to spawn analysis process: {message}")]
    Spawn { message: String },
}

#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub stdout: String,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub interpreter: String,
    pub timeout: Duration,
    pub output_cap: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            timeout: Duration::from_secs(5),
            output_cap: 2000,
        }
    }
}

pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Run one analysis snippet against the session/master files.
    ///
    /// The subprocess is spawned with kill-on-drop, so a timeout leaves no
    /// runaway process behind: dropping the wait future reaps the child.
    pub async fn execute(
        &self,
        code: &str,
        session_path: Option<&Path>,
        master_path: &Path,
    ) -> Result<SandboxOutput, SandboxError> {
        // A missing interpreter is an environment problem, not a code
        // problem; detect it up front so the error says so.
        if which::which(&self.config.interpreter).is_err() {
            return Err(SandboxError::Spawn {
                message: format!(
                    "interpreter '{}' not found in PATH",
                    self.config.interpreter
                ),
            });
        }

        let harness = build_harness(code, session_path, master_path);

        let child = Command::new(&self.config.interpreter)
            .arg("-c")
            .arg(&harness)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Spawn {
                message: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Err(_) => {
                tracing::warn!(
                    limit_secs = self.config.timeout.as_secs(),
                    "Sandboxed analysis timed out; process killed"
                );
                return Err(SandboxError::Timeout {
                    limit_secs: self.config.timeout.as_secs(),
                });
            }
            Ok(Err(e)) => {
                return Err(SandboxError::Spawn {
                    message: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(SandboxError::Exited {
                code: output.status.code().unwrap_or(-1),
                stderr: truncate_str(&stderr, self.config.output_cap).to_string(),
            });
        }

        let truncated = stdout.len() > self.config.output_cap;
        if truncated {
            tracing::debug!(
                original_bytes = stdout.len(),
                cap = self.config.output_cap,
                "Sandbox stdout truncated"
            );
        }
        Ok(SandboxOutput {
            stdout: truncate_str(&stdout, self.config.output_cap).to_string(),
            truncated,
        })
    }
}

/// Wrap the snippet in the fixed harness. The paths are injected as string
/// constants; the snippet gets a `load_rows` helper but no write access to
/// anything durable.
fn build_harness(code: &str, session_path: Option<&Path>, master_path: &Path) -> String {
    let session_literal = match session_path {
        Some(p) => serde_json::to_string(&p.to_string_lossy()).unwrap_or_else(|_| "None".into()),
        None => "None".into(),
    };
    let master_literal =
        serde_json::to_string(&master_path.to_string_lossy()).unwrap_or_else(|_| "None".into());

    format!(
        r#"import json, sys

SESSION_PATH = {session_literal}
MASTER_PATH = {master_literal}

def load_rows(path):
    if not path:
        return []
    rows = []
    try:
        with open(path) as f:
            for line in f:
                line = line.strip()
                if line:
                    rows.append(json.loads(line))
    except FileNotFoundError:
        pass
    return rows

# --- analysis snippet ---
{code}
"#
    )
}
