//! Runtime configuration for the control loop.
//!
//! These are separate from the TOML-deserialized config in `relay_config`;
//! see `conversions` for the bridge.
use std::time::Duration;

/// How warmer/cooler calls are scheduled relative to the tick loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Spawn one thread per dispatch and never wait for it. Failures are
    /// reported at the next tick boundary.
    #[default]
    Detached,
    /// Call the action on the loop thread before the tick continues.
    Blocking,
}

/// Post-processing of the spectral weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WeightMode {
    /// Unbounded weight as computed.
    #[default]
    Raw,
    /// Divide by the largest |weight| seen so far once it exceeds 1.
    RunningMax,
}

/// Loop tuning.
#[derive(Debug, Clone)]
pub struct LoopCfg {
    /// Sleep between ticks.
    pub delay: Duration,
    /// Error window capacity (>= 2).
    pub lookback: usize,
    /// Ramp length in ticks (>= 1; 1 applies the first error in one step).
    pub ramp: u32,
    pub dispatch: DispatchMode,
    pub weight: WeightMode,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            lookback: relay_config::DEFAULT_LOOKBACK,
            ramp: relay_config::DEFAULT_RAMP,
            dispatch: DispatchMode::Detached,
            weight: WeightMode::Raw,
        }
    }
}
