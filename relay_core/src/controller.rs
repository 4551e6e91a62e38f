//! The control loop: one `tick()` per poll.
use std::sync::Arc;

use relay_traits::{Clock, StopDecision};

use crate::config::LoopCfg;
use crate::dispatch::ActionDispatcher;
use crate::error::{RelayError, Result};
use crate::ramp::RampPlan;
use crate::source::SampleSource;
use crate::status::{Phase, TickReport, TickStatus};
use crate::stop::StopEvaluator;
use crate::telemetry::TelemetrySink;
use crate::util::{mean, round_to_i64};
use crate::weight::WeightEstimator;
use crate::window::ErrorWindow;

/// Closed-loop controller for one PV/SP pair.
///
/// Per tick: drain detached dispatch failures, sample SP then PV, compute
/// `err = SP - PV`, then either take the next ramp value (ramping, the window
/// gets a 0) or push `err` and compute `MV = round(err - weight * mean)`
/// (steady). The MV is dispatched, the report goes to telemetry, the loop
/// sleeps, and finally the stop condition sees the window contents.
pub struct ControlLoop {
    pub(crate) source: SampleSource,
    pub(crate) window: ErrorWindow,
    pub(crate) estimator: WeightEstimator,
    pub(crate) ramp: Option<RampPlan>,
    pub(crate) dispatcher: ActionDispatcher,
    pub(crate) stop: StopEvaluator,
    pub(crate) telemetry: Box<dyn TelemetrySink>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) cfg: LoopCfg,
    pub(crate) index: u64,
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("tick", &self.index)
            .field("phase", &self.phase())
            .field("window_len", &self.window.len())
            .field("dispatcher", &self.dispatcher)
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl ControlLoop {
    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.index
    }

    pub fn phase(&self) -> Phase {
        if self.index < u64::from(self.cfg.ramp) {
            Phase::Ramping
        } else {
            Phase::Steady
        }
    }

    pub fn cfg(&self) -> &LoopCfg {
        &self.cfg
    }

    /// Current error window, oldest first.
    pub fn window(&self) -> &[f64] {
        self.window.as_slice()
    }

    /// The ramp plan while it is live.
    pub fn ramp_plan(&self) -> Option<&RampPlan> {
        self.ramp.as_ref()
    }

    /// Run one iteration.
    pub fn tick(&mut self) -> Result<TickStatus> {
        self.dispatcher.check_failures()?;

        let sample = self.source.sample()?;
        let (sp, pv) = (sample.sp, sample.pv);
        let err = sample.err();
        tracing::debug!(pv, sp, "got metric value");
        if !err.is_finite() {
            return Err(eyre::Report::new(RelayError::ErrorOverflow { sp, pv }));
        }

        let phase = self.phase();
        let (mv, weight, window_mean) = match phase {
            Phase::Ramping => {
                let ramp_len = self.cfg.ramp;
                let plan = self
                    .ramp
                    .get_or_insert_with(|| RampPlan::new(err, ramp_len));
                let mv = plan.next().unwrap_or(0);
                let snapshot = self.window.push(0.0);
                (mv, None, mean(snapshot))
            }
            Phase::Steady => {
                if let Some(plan) = self.ramp.take() {
                    tracing::debug!(unused = plan.remaining(), "ramp finished");
                }
                let snapshot = self.window.push(err);
                let weight = self.estimator.estimate(snapshot);
                let m = mean(snapshot);
                let mv = round_to_i64(err - weight * m);
                tracing::debug!(err, weight, mean = m, "steady state");
                (mv, Some(weight), m)
            }
        };

        let dispatched = self.dispatcher.dispatch(mv)?;
        let report = TickReport {
            tick: self.index,
            phase,
            pv,
            sp,
            err,
            weight,
            mean: window_mean,
            mv,
            dispatched,
        };
        self.telemetry.record(&report);

        self.clock.sleep(self.cfg.delay);

        let decision = self.stop.evaluate(self.window.as_slice())?;
        self.index += 1;

        Ok(match decision {
            StopDecision::Continue => TickStatus::Continue(report),
            StopDecision::Exit(code) => TickStatus::Stop { code, report },
        })
    }
}
