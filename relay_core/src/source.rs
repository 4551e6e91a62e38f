//! Paired metric/target sampling.
use eyre::WrapErr;
use relay_traits::Source;

use crate::error::{PluginRole, RelayError, Result};
use crate::plugin_error::map_plugin_error;

/// One tick's readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Setpoint.
    pub sp: f64,
    /// Process variable.
    pub pv: f64,
}

impl Sample {
    /// `SP - PV`: positive means too cold, negative means too hot.
    #[inline]
    pub fn err(&self) -> f64 {
        self.sp - self.pv
    }
}

/// Owns the metric and target streams. Both are polled once per tick,
/// target first.
pub struct SampleSource {
    metric: Box<dyn Source>,
    target: Box<dyn Source>,
}

impl std::fmt::Debug for SampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSource").finish_non_exhaustive()
    }
}

impl SampleSource {
    pub fn new(metric: Box<dyn Source>, target: Box<dyn Source>) -> Self {
        Self { metric, target }
    }

    /// Advance the metric stream.
    pub fn metric(&mut self) -> Result<f64> {
        read(PluginRole::Metric, self.metric.as_mut())
    }

    /// Advance the target stream.
    pub fn target(&mut self) -> Result<f64> {
        read(PluginRole::Target, self.target.as_mut())
    }

    pub fn sample(&mut self) -> Result<Sample> {
        let sp = self.target()?;
        let pv = self.metric()?;
        Ok(Sample { sp, pv })
    }
}

fn read(role: PluginRole, src: &mut dyn Source) -> Result<f64> {
    let v = src
        .next_value()
        .map_err(|e| eyre::Report::new(map_plugin_error(role, &*e)))
        .wrap_err_with(|| format!("reading {role}"))?;
    if !v.is_finite() {
        return Err(eyre::Report::new(RelayError::NonFinite { role, value: v })
            .wrap_err(format!("reading {role}")));
    }
    Ok(v)
}
