//! PW-019: Shell-hook alert. Runs an operator command through `bash`.
//!
//! The hook receives `PROVWATCH_RUN_ID`, `PROVWATCH_REASONS` and
//! `PROVWATCH_FINDINGS` in its environment.

use super::{AlertSink, Breach};
use std::io::Write;
use std::process::{Command, Stdio};

/// Output from a finished hook.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Execute a shell script locally via `bash` with extra environment.
pub fn exec_local(script: &str, env: &[(&str, String)]) -> Result<ExecOutput, String> {
    let mut cmd = Command::new("bash");
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd
        .spawn()
        .map_err(|e| format!("failed to spawn bash: {}", e))?;

    if let Some(ref mut stdin) = child.stdin {
        stdin
            .write_all(script.as_bytes())
            .map_err(|e| format!("stdin write error: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("wait error: {}", e))?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Alert sink backed by `alert_command`.
#[derive(Debug, Clone)]
pub struct CommandAlert {
    pub script: String,
}

impl CommandAlert {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl AlertSink for CommandAlert {
    fn name(&self) -> &str {
        "command"
    }

    fn on_breach(&self, breach: &Breach) -> Result<(), String> {
        let env = [
            ("PROVWATCH_RUN_ID", breach.run_id.clone()),
            ("PROVWATCH_REASONS", breach.reasons.to_string()),
            ("PROVWATCH_FINDINGS", breach.findings.to_string()),
        ];
        let out = exec_local(&self.script, &env)?;
        if out.success() {
            Ok(())
        } else {
            Err(format!(
                "alert command exited {}: {}",
                out.exit_code,
                out.stderr.trim()
            ))
        }
    }
}
