//! Built-in metric and target sources.
use relay_traits::{BoxError, Source};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::PluginError;
use crate::util::{parse_number, run_capture};

/// Marker printed by the demo tasks that `bash_echo_warmer` starts.
pub const DEMO_TASK_MARKER: &str = "from bash: started relay launcher task";

/// Repeats one value forever. Also models a numeric `--target`.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f64);

impl Source for Constant {
    fn next_value(&mut self) -> Result<f64, BoxError> {
        Ok(self.0)
    }
}

/// Uniform pseudo-random 0/1 stream (xorshift32).
#[derive(Debug, Clone)]
pub struct SometimesOne {
    state: u32,
}

impl SometimesOne {
    pub fn with_seed(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0x9E37_79B9);
        Self::with_seed(nanos)
    }
}

impl Source for SometimesOne {
    fn next_value(&mut self) -> Result<f64, BoxError> {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        Ok(f64::from(x >> 31))
    }
}

/// Four low samples then four high samples, repeating.
#[derive(Debug, Clone, Default)]
pub struct SquareWave {
    n: u8,
}

impl Source for SquareWave {
    fn next_value(&mut self) -> Result<f64, BoxError> {
        let v = if self.n < 4 { 0.0 } else { 1.0 };
        self.n = (self.n + 1) % 8;
        Ok(v)
    }
}

/// Cycles through a recorded trace.
#[derive(Debug, Clone)]
pub struct Replay {
    values: Vec<f64>,
    idx: usize,
}

impl Replay {
    pub fn new(values: Vec<f64>) -> Result<Self, PluginError> {
        if values.is_empty() {
            return Err(PluginError::Exhausted);
        }
        Ok(Self { values, idx: 0 })
    }
}

impl Source for Replay {
    fn next_value(&mut self) -> Result<f64, BoxError> {
        let v = self.values[self.idx];
        self.idx = (self.idx + 1) % self.values.len();
        Ok(v)
    }
}

/// Runs a shell command per poll and parses its output as the reading.
#[derive(Debug, Clone)]
pub struct ShellMetric {
    command: String,
}

impl ShellMetric {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Counts the demo tasks started by `bash_echo_warmer`.
    pub fn bash_echo() -> Self {
        // `[f]rom` keeps the pattern from matching this shell's own command line.
        Self::new(format!("pgrep -fc '[f]{}' || true", &DEMO_TASK_MARKER[1..]))
    }
}

impl Source for ShellMetric {
    fn next_value(&mut self) -> Result<f64, BoxError> {
        let out = run_capture(&self.command, &[])?;
        let v = parse_number(&out)?;
        tracing::trace!(command = %self.command, value = v, "shell metric sample");
        Ok(v)
    }
}
