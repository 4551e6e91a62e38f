//! Spectral damping weight for the error window.
//!
//! The window is transformed with a forward FFT. The DC bin is dropped and
//! only the one-sided spectrum `1..n/2` is kept. For each kept frequency
//! `j` (1-based) with phase `phi` and amplitude `a`, an amplitude integral
//! is accumulated by stepping backwards from `phi` in increments of one
//! sample's phase advance (`2*pi*j/n`) over `ceil(n/j)` samples:
//!
//! ```text
//! ai = |sin(phi)| + sum_{i=1..ceil(n/j)} |sin(phi - i * 2*pi*j/n)|
//! ```
//!
//! and the weight is `sum_j sin(phi_j) / ai_j * a_j / sum(a)`.
//!
//! Windows shorter than 3 samples, flat windows, and windows whose retained
//! spectrum is exactly zero all yield a weight of 1.
use std::f64::consts::TAU;
use std::fmt;

use rustfft::{FftPlanner, num_complex::Complex};

use crate::config::WeightMode;

/// Smallest window the spectral analysis runs on.
pub const MIN_SPECTRAL_SAMPLES: usize = 3;

/// Fallback weight for degenerate windows.
pub const NEUTRAL_WEIGHT: f64 = 1.0;

/// Computes the damping weight once per steady-state tick.
///
/// Holds an FFT planner so repeated window sizes reuse their plan.
pub struct WeightEstimator {
    planner: FftPlanner<f64>,
    mode: WeightMode,
    running_max: f64,
}

impl fmt::Debug for WeightEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightEstimator")
            .field("mode", &self.mode)
            .field("running_max", &self.running_max)
            .finish_non_exhaustive()
    }
}

impl Default for WeightEstimator {
    fn default() -> Self {
        Self::new(WeightMode::Raw)
    }
}

impl WeightEstimator {
    pub fn new(mode: WeightMode) -> Self {
        Self {
            planner: FftPlanner::new(),
            mode,
            running_max: 0.0,
        }
    }

    pub fn mode(&self) -> WeightMode {
        self.mode
    }

    /// Weight for the current window contents (oldest first).
    pub fn estimate(&mut self, window: &[f64]) -> f64 {
        let raw = weight_with(&mut self.planner, window);
        match self.mode {
            WeightMode::Raw => raw,
            WeightMode::RunningMax => {
                let m = raw.abs();
                if m.is_finite() && m > self.running_max {
                    self.running_max = m;
                }
                if self.running_max > 1.0 {
                    raw / self.running_max
                } else {
                    raw
                }
            }
        }
    }
}

/// One-off weight computation with a fresh planner.
pub fn spectral_weight(window: &[f64]) -> f64 {
    weight_with(&mut FftPlanner::new(), window)
}

fn weight_with(planner: &mut FftPlanner<f64>, window: &[f64]) -> f64 {
    let n = window.len();
    if n < MIN_SPECTRAL_SAMPLES {
        tracing::debug!(
            samples = n,
            "too few samples for spectral weighting, using neutral weight"
        );
        return NEUTRAL_WEIGHT;
    }
    if is_flat(window) {
        tracing::warn!("no variation in the error signal, using neutral weight");
        return NEUTRAL_WEIGHT;
    }

    let fft = planner.plan_fft_forward(n);
    let mut buf: Vec<Complex<f64>> = window.iter().map(|&v| Complex::new(v, 0.0)).collect();
    fft.process(&mut buf);

    let spectrum = &buf[1..n / 2];
    let total: Complex<f64> = spectrum.iter().sum();
    let amp_sum: f64 = spectrum.iter().map(|c| c.norm()).sum();
    if spectrum.is_empty() || total == Complex::new(0.0, 0.0) || amp_sum == 0.0 {
        tracing::warn!("no spectral energy in the error signal, using neutral weight");
        return NEUTRAL_WEIGHT;
    }

    #[allow(clippy::cast_precision_loss)]
    let len = n as f64;
    let mut weight = 0.0;
    for (idx, c) in spectrum.iter().enumerate() {
        let phase = c.arg();
        #[allow(clippy::cast_precision_loss)]
        let per_cycle = len / (idx + 1) as f64;
        let integral = amplitude_integral(phase, per_cycle);
        if integral > 0.0 {
            weight += phase.sin() / integral * (c.norm() / amp_sum);
        }
    }
    weight
}

/// Sum of `|sin|` over the newest sample's phase and the `ceil(per_cycle)`
/// samples before it at this frequency.
fn amplitude_integral(phase: f64, per_cycle: f64) -> f64 {
    let delta = TAU / per_cycle;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = per_cycle.ceil() as usize;
    let mut p = phase;
    let mut acc = phase.sin().abs();
    for _ in 0..steps {
        p -= delta;
        acc += p.sin().abs();
    }
    acc
}

fn is_flat(window: &[f64]) -> bool {
    window.windows(2).all(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_windows_are_neutral() {
        assert_eq!(spectral_weight(&[]), 1.0);
        assert_eq!(spectral_weight(&[3.0]), 1.0);
        assert_eq!(spectral_weight(&[3.0, -1.0]), 1.0);
        // n = 3 keeps no bins
        assert_eq!(spectral_weight(&[0.0, 1.0, 5.0]), 1.0);
    }

    #[test]
    fn flat_window_is_exactly_one() {
        assert_eq!(spectral_weight(&[4.2; 16]), 1.0);
        assert_eq!(spectral_weight(&[0.0; 100]), 1.0);
    }

    #[test]
    fn varying_window_is_finite_and_not_neutral() {
        let w: Vec<f64> = (0..32).map(|i| (f64::from(i) * 0.7).sin() * 3.0).collect();
        let v = spectral_weight(&w);
        assert!(v.is_finite());
        assert!(v != 1.0);
    }

    #[test]
    fn integral_counts_newest_sample_plus_cycle() {
        // per_cycle = 2: steps back by pi twice
        let phase = std::f64::consts::FRAC_PI_2;
        let ai = amplitude_integral(phase, 2.0);
        assert!((ai - 3.0).abs() < 1e-12);
    }

    #[test]
    fn running_max_mode_bounds_output() {
        let mut est = WeightEstimator::new(WeightMode::RunningMax);
        let mut raw = WeightEstimator::new(WeightMode::Raw);
        let windows: Vec<Vec<f64>> = (1..20)
            .map(|k| {
                (0..24)
                    .map(|i| (f64::from(i) * f64::from(k) * 0.37).cos() * f64::from(k))
                    .collect()
            })
            .collect();
        for w in &windows {
            let a = est.estimate(w);
            let b = raw.estimate(w);
            assert!(a.abs() <= b.abs().max(1.0) + 1e-12);
            assert!(a.abs() <= 1.0 + 1e-12 || b.abs() <= 1.0);
        }
    }
}
