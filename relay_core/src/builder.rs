//! Type-state builder for `ControlLoop`.
//!
//! The builder enforces at compile time that a metric and a target are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks.
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use relay_traits::{Action, Clock, MonotonicClock, Source, StopCondition};

use crate::config::{DispatchMode, LoopCfg, WeightMode};
use crate::controller::ControlLoop;
use crate::dispatch::ActionDispatcher;
use crate::error::{BuildError, Result};
use crate::source::SampleSource;
use crate::stop::StopEvaluator;
use crate::telemetry::{TelemetrySink, TracingSink};
use crate::weight::WeightEstimator;
use crate::window::ErrorWindow;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct ControlLoopBuilder<M, T> {
    metric: Option<Box<dyn Source>>,
    target: Option<Box<dyn Source>>,
    warmer: Option<Arc<dyn Action>>,
    cooler: Option<Arc<dyn Action>>,
    stop_condition: Option<Box<dyn StopCondition>>,
    telemetry: Option<Box<dyn TelemetrySink>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    cfg: LoopCfg,
    _m: PhantomData<M>,
    _t: PhantomData<T>,
}

impl Default for ControlLoopBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            metric: None,
            target: None,
            warmer: None,
            cooler: None,
            stop_condition: None,
            telemetry: None,
            clock: None,
            cfg: LoopCfg::default(),
            _m: PhantomData,
            _t: PhantomData,
        }
    }
}

impl ControlLoop {
    /// Start building a ControlLoop.
    pub fn builder() -> ControlLoopBuilder<Missing, Missing> {
        ControlLoopBuilder::default()
    }
}

fn validate(cfg: &LoopCfg, has_action: bool) -> Result<()> {
    if !has_action {
        return Err(eyre::Report::new(BuildError::MissingAction));
    }
    if cfg.lookback < 2 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "lookback must be >= 2",
        )));
    }
    if cfg.lookback > relay_config::MAX_LOOKBACK {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "lookback must be <= 1000000",
        )));
    }
    if cfg.ramp == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "ramp must be >= 1",
        )));
    }
    Ok(())
}

impl<M, T> ControlLoopBuilder<M, T> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<ControlLoop> {
        let metric = self
            .metric
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMetric))?;
        let target = self
            .target
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTarget))?;
        validate(&self.cfg, self.warmer.is_some() || self.cooler.is_some())?;

        let cfg = self.cfg;
        tracing::info!(
            delay_ms = u64::try_from(cfg.delay.as_millis()).unwrap_or(u64::MAX),
            lookback = cfg.lookback,
            ramp = cfg.ramp,
            dispatch = ?cfg.dispatch,
            weight = ?cfg.weight,
            warmer = self.warmer.is_some(),
            cooler = self.cooler.is_some(),
            stop_condition = self.stop_condition.is_some(),
            "control loop configured"
        );
        Ok(ControlLoop {
            source: SampleSource::new(metric, target),
            window: ErrorWindow::new(cfg.lookback),
            estimator: WeightEstimator::new(cfg.weight),
            ramp: None,
            dispatcher: ActionDispatcher::new(self.warmer, self.cooler, cfg.dispatch),
            stop: StopEvaluator::new(self.stop_condition),
            telemetry: self
                .telemetry
                .unwrap_or_else(|| Box::new(TracingSink)),
            clock: self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            cfg,
            index: 0,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<M, T> ControlLoopBuilder<M, T> {
    pub fn with_warmer(mut self, warmer: Arc<dyn Action>) -> Self {
        self.warmer = Some(warmer);
        self
    }
    pub fn with_cooler(mut self, cooler: Arc<dyn Action>) -> Self {
        self.cooler = Some(cooler);
        self
    }
    pub fn with_stop_condition(mut self, stop: impl StopCondition + 'static) -> Self {
        self.stop_condition = Some(Box::new(stop));
        self
    }
    /// Replace the whole loop configuration.
    pub fn with_cfg(mut self, cfg: LoopCfg) -> Self {
        self.cfg = cfg;
        self
    }
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.cfg.delay = delay;
        self
    }
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.cfg.lookback = lookback;
        self
    }
    pub fn with_ramp(mut self, ramp: u32) -> Self {
        self.cfg.ramp = ramp;
        self
    }
    pub fn with_dispatch(mut self, mode: DispatchMode) -> Self {
        self.cfg.dispatch = mode;
        self
    }
    pub fn with_weight_mode(mut self, mode: WeightMode) -> Self {
        self.cfg.weight = mode;
        self
    }
    /// Defaults to `TracingSink` when not provided.
    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Some(Box::new(sink));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
}

// Setters that advance type-state
impl<T> ControlLoopBuilder<Missing, T> {
    pub fn with_metric(self, metric: impl Source + 'static) -> ControlLoopBuilder<Set, T> {
        ControlLoopBuilder {
            metric: Some(Box::new(metric)),
            target: self.target,
            warmer: self.warmer,
            cooler: self.cooler,
            stop_condition: self.stop_condition,
            telemetry: self.telemetry,
            clock: self.clock,
            cfg: self.cfg,
            _m: PhantomData,
            _t: PhantomData,
        }
    }
}

impl<M> ControlLoopBuilder<M, Missing> {
    pub fn with_target(self, target: impl Source + 'static) -> ControlLoopBuilder<M, Set> {
        ControlLoopBuilder {
            metric: self.metric,
            target: Some(Box::new(target)),
            warmer: self.warmer,
            cooler: self.cooler,
            stop_condition: self.stop_condition,
            telemetry: self.telemetry,
            clock: self.clock,
            cfg: self.cfg,
            _m: PhantomData,
            _t: PhantomData,
        }
    }
}

impl ControlLoopBuilder<Set, Set> {
    /// Build once metric and target are set; still validates the rest.
    pub fn build(self) -> Result<ControlLoop> {
        self.try_build()
    }
}
