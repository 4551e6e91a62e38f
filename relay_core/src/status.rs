//! Per-tick status returned from the control loop.
use serde::Serialize;

use crate::dispatch::DispatchOutcome;

/// Loop state. `Ramping` lasts for the first `ramp` ticks; `Steady` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ramping,
    Steady,
}

/// Everything one tick observed and decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// 0-based tick index.
    pub tick: u64,
    pub phase: Phase,
    pub pv: f64,
    pub sp: f64,
    pub err: f64,
    /// Spectral weight; absent while ramping.
    pub weight: Option<f64>,
    /// Mean of the error window after this tick's push.
    pub mean: f64,
    pub mv: i64,
    pub dispatched: DispatchOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickStatus {
    /// Keep ticking.
    Continue(TickReport),
    /// The stop condition asked the process to exit with `code`.
    Stop { code: i32, report: TickReport },
}

impl TickStatus {
    pub fn report(&self) -> &TickReport {
        match self {
            TickStatus::Continue(r) | TickStatus::Stop { report: r, .. } => r,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TickStatus::Continue(_) => None,
            TickStatus::Stop { code, .. } => Some(*code),
        }
    }
}
