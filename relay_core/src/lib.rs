#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Closed-loop control core (plugin-agnostic).
//!
//! All I/O goes through `relay_traits::Source`, `relay_traits::Action` and
//! `relay_traits::StopCondition`; this crate only decides what to do with
//! the readings.
//!
//! ## Architecture
//!
//! - **Sampling**: `SampleSource` polls target then metric once per tick
//! - **History**: `ErrorWindow` keeps the last `lookback` errors
//! - **Start-up**: `RampPlan` spreads the first error over the ramp ticks
//! - **Damping**: `WeightEstimator` derives a weight from the window's spectrum
//! - **Actuation**: `ActionDispatcher` calls the warmer or cooler
//! - **Termination**: `StopEvaluator` consults the optional stop condition
//! - **Orchestration**: `ControlLoop::tick` and `runner::run`
//!
//! ## Failure policy
//!
//! Plugin failures are fatal. Every error from a source, action or stop
//! condition is mapped to a typed `RelayError` and returned from `tick()`;
//! nothing is retried and no default reading is substituted. Degenerate
//! windows and too-short ramps are handled by documented fallbacks.

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod dispatch;
pub mod error;
pub mod mocks;
pub mod plugin_error;
pub mod ramp;
pub mod runner;
pub mod source;
pub mod status;
pub mod stop;
pub mod telemetry;
pub mod util;
pub mod weight;
pub mod window;

pub use builder::{ControlLoopBuilder, Missing, Set};
pub use config::{DispatchMode, LoopCfg, WeightMode};
pub use controller::ControlLoop;
pub use dispatch::{ActionDispatcher, DispatchOutcome};
pub use error::{BuildError, PluginRole, RelayError, Report, Result};
pub use ramp::RampPlan;
pub use runner::{DRAIN_TIMEOUT, INTERRUPTED_EXIT_CODE, RunOutcome, run};
pub use source::{Sample, SampleSource};
pub use status::{Phase, TickReport, TickStatus};
pub use stop::StopEvaluator;
pub use telemetry::{FanoutSink, JsonlSink, NullSink, TelemetrySink, TracingSink};
pub use weight::{WeightEstimator, spectral_weight};
pub use window::ErrorWindow;
