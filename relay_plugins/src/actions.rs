//! Built-in warmers and coolers.
use relay_traits::{Action, BoxError};

use crate::sources::DEMO_TASK_MARKER;
use crate::util::{run_capture, spawn_detached};

/// Dry-run action: only logs the magnitude it was asked to apply.
#[derive(Debug, Clone, Default)]
pub struct LogAction {
    pub label: String,
}

impl Action for LogAction {
    fn apply(&self, magnitude: i64) -> Result<(), BoxError> {
        tracing::info!(action = %self.label, magnitude, "action invoked");
        Ok(())
    }
}

/// Runs a shell command with `RELAY_MV` set to the signed magnitude.
#[derive(Debug, Clone)]
pub struct ShellAction {
    command: String,
}

impl ShellAction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Action for ShellAction {
    fn apply(&self, magnitude: i64) -> Result<(), BoxError> {
        run_capture(&self.command, &[("RELAY_MV", magnitude.to_string())])?;
        Ok(())
    }
}

/// Starts `n` short-lived demo tasks that `bash_echo_metric` counts.
#[derive(Debug, Clone, Default)]
pub struct BashEchoWarmer;

impl Action for BashEchoWarmer {
    fn apply(&self, magnitude: i64) -> Result<(), BoxError> {
        let cmd = format!("sleep 1; echo {DEMO_TASK_MARKER} >/dev/null; sleep 2");
        for _ in 0..magnitude.unsigned_abs() {
            spawn_detached(&cmd)?;
        }
        tracing::debug!(started = magnitude.unsigned_abs(), "demo tasks started");
        Ok(())
    }
}

/// Terminates up to `|n|` of the running demo tasks.
#[derive(Debug, Clone, Default)]
pub struct BashEchoCooler;

impl Action for BashEchoCooler {
    fn apply(&self, magnitude: i64) -> Result<(), BoxError> {
        let n = magnitude.unsigned_abs();
        let cmd = format!(
            "pids=$(pgrep -f '[f]{}' | tail -n {n} || true); [ -z \"$pids\" ] || kill $pids 2>/dev/null || true",
            &DEMO_TASK_MARKER[1..]
        );
        run_capture(&cmd, &[])?;
        tracing::debug!(requested = n, "demo tasks stopped");
        Ok(())
    }
}
