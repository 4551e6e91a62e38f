use std::process::{Command, Stdio};

use crate::error::{PluginError, Result};

/// Build a `bash -c` invocation that fails when any stage of a pipeline fails.
pub fn shell(command: &str) -> Command {
    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(format!("set -o pipefail; {command}"));
    cmd
}

/// Run `command` to completion and return its trimmed stdout.
pub fn run_capture(command: &str, envs: &[(&str, String)]) -> Result<String> {
    let mut cmd = shell(command);
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let out = cmd.stdin(Stdio::null()).output()?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(PluginError::Command {
            command: command.to_string(),
            reason: format!("{} {}", out.status, stderr.trim()),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Start `command` in the background and return its pid.
///
/// The caller does not wait; a small named thread reaps the child when it
/// exits so finished tasks never linger as zombies.
pub fn spawn_detached(command: &str) -> Result<u32> {
    let mut child = shell(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let pid = child.id();
    std::thread::Builder::new()
        .name(format!("relay-reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => tracing::trace!(pid, %status, "background task exited"),
            Err(e) => tracing::warn!(pid, error = %e, "failed to reap background task"),
        })?;
    Ok(pid)
}

/// Parse the last non-empty line of command output as a number.
pub fn parse_number(output: &str) -> Result<f64> {
    let line = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    match line.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PluginError::Parse {
            output: output.to_string(),
        }),
    }
}
