//! Built-in stop conditions.
use relay_traits::{BoxError, StopCondition, StopDecision};

/// Never asks the loop to stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl StopCondition for Never {
    fn evaluate(&mut self, _errors: &[f64]) -> Result<StopDecision, BoxError> {
        Ok(StopDecision::Continue)
    }
}

/// Exits with `code` on the `ticks`-th evaluation.
#[derive(Debug, Clone)]
pub struct StopAfter {
    ticks: u64,
    code: i32,
    seen: u64,
}

impl StopAfter {
    pub fn new(ticks: u64, code: i32) -> Self {
        Self {
            ticks: ticks.max(1),
            code,
            seen: 0,
        }
    }
}

impl StopCondition for StopAfter {
    fn evaluate(&mut self, _errors: &[f64]) -> Result<StopDecision, BoxError> {
        self.seen = self.seen.saturating_add(1);
        if self.seen >= self.ticks {
            Ok(StopDecision::Exit(self.code))
        } else {
            Ok(StopDecision::Continue)
        }
    }
}

/// Exits when the error magnitude keeps growing: more than `ratio` of the
/// consecutive steps in the history increased `|err|`.
///
/// Steps between two zero samples (ramp placeholders) are not counted.
#[derive(Debug, Clone)]
pub struct MostlyDiverging {
    pub code: i32,
    pub min_samples: usize,
    pub ratio: f64,
}

impl MostlyDiverging {
    pub const DEFAULT_CODE: i32 = 1;

    pub fn new(code: i32) -> Self {
        Self {
            code,
            min_samples: 10,
            ratio: 0.8,
        }
    }

    fn is_diverging(&self, errors: &[f64]) -> bool {
        let mut steps = 0usize;
        let mut growing = 0usize;
        for pair in errors.windows(2) {
            let (a, b) = (pair[0].abs(), pair[1].abs());
            if a == 0.0 && b == 0.0 {
                continue;
            }
            steps += 1;
            if b > a {
                growing += 1;
            }
        }
        steps + 1 >= self.min_samples && (growing as f64) > self.ratio * (steps as f64)
    }
}

impl Default for MostlyDiverging {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CODE)
    }
}

impl StopCondition for MostlyDiverging {
    fn evaluate(&mut self, errors: &[f64]) -> Result<StopDecision, BoxError> {
        if self.is_diverging(errors) {
            tracing::warn!(samples = errors.len(), "error magnitude is mostly diverging");
            Ok(StopDecision::Exit(self.code))
        } else {
            Ok(StopDecision::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_after_counts_evaluations() {
        let mut s = StopAfter::new(3, 2);
        assert_eq!(s.evaluate(&[]).unwrap(), StopDecision::Continue);
        assert_eq!(s.evaluate(&[]).unwrap(), StopDecision::Continue);
        assert_eq!(s.evaluate(&[]).unwrap(), StopDecision::Exit(2));
    }

    #[test]
    fn diverging_history_triggers() {
        let mut s = MostlyDiverging::default();
        let errs: Vec<f64> = (1..=12).map(|i| -(i as f64)).collect();
        assert_eq!(s.evaluate(&errs).unwrap(), StopDecision::Exit(1));
    }

    #[test]
    fn converging_or_short_history_continues() {
        let mut s = MostlyDiverging::default();
        let converging: Vec<f64> = (1..=12).rev().map(f64::from).collect();
        assert_eq!(s.evaluate(&converging).unwrap(), StopDecision::Continue);
        let short: Vec<f64> = (1..=5).map(f64::from).collect();
        assert_eq!(s.evaluate(&short).unwrap(), StopDecision::Continue);
    }

    #[test]
    fn ramp_zeros_are_ignored() {
        let mut s = MostlyDiverging::default();
        let mut errs = vec![0.0; 20];
        errs.extend([1.0, 2.0, 3.0]);
        // 3 counted steps is below the sample floor
        assert_eq!(s.evaluate(&errs).unwrap(), StopDecision::Continue);
    }
}
