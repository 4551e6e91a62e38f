//! Drive a `ControlLoop` until it stops or is interrupted.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;

use crate::controller::ControlLoop;
use crate::error::Result;
use crate::status::TickStatus;

/// Exit code reported when the run is interrupted from outside.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How long a stopping run waits for detached dispatches to report back.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stop condition returned this code.
    Stopped(i32),
    /// `shutdown` was raised between ticks.
    Interrupted,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Stopped(code) => code,
            RunOutcome::Interrupted => INTERRUPTED_EXIT_CODE,
        }
    }
}

/// Tick until the stop condition fires or `shutdown` is set.
///
/// The flag is checked before every tick; an in-flight tick always
/// completes. Errors from any tick end the run immediately. When the stop
/// condition fires, detached dispatches get up to [`DRAIN_TIMEOUT`] to finish
/// and any failure they report turns the stop into an error.
pub fn run(control: &mut ControlLoop, shutdown: &AtomicBool) -> Result<RunOutcome> {
    tracing::info!(cfg = ?control.cfg(), "starting relay");
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(ticks = control.ticks(), "shutdown requested, relay is stopping");
            return Ok(RunOutcome::Interrupted);
        }
        match control.tick()? {
            TickStatus::Continue(_) => continue,
            TickStatus::Stop { code, report } => {
                control
                    .dispatcher
                    .drain(DRAIN_TIMEOUT)
                    .wrap_err("draining detached dispatches")?;
                tracing::info!(code, tick = report.tick, "relay stopped by stop condition");
                return Ok(RunOutcome::Stopped(code));
            }
        }
    }
}
