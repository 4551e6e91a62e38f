//! Start-up ramp: spreads the first tick's error over a staircase of
//! decreasing corrections instead of applying it in one step.
//!
//! For an integer error `e` and ramp length `r > 1` the plan picks the largest
//! `k` with `k(k+1)/2 <= |e|` and walks the levels `k, k-1, ..., 1`. Whatever
//! the triangle leaves over (`|e| - k(k+1)/2`) is added to the first level, so
//! the emitted corrections always sum to exactly `e`. Each level is split into
//! `niter = r / (2k)` equal sub-steps followed by one sub-step carrying the
//! integer-division remainder. After the staircase the plan yields zeros.
//!
//! A ramp of 1, a zero error, or a ramp too short to give every level at
//! least one sub-step (`niter == 0`) degrades to a single correction of `e`.

/// One-shot ramp plan, consumed one value per ramping tick.
///
/// The iterator never ends: once the plan is spent it keeps yielding 0.
#[derive(Debug, Clone)]
pub struct RampPlan {
    sign: i64,
    /// Size of the first (largest) staircase level, remainder included.
    planned_step: i64,
    levels: u64,
    niter: u64,
    /// Level currently being emitted, counting down from `levels`.
    level: u64,
    /// Sub-step within the current level, `0..=niter`.
    sub: u64,
    emitted: u64,
    total_steps: u64,
}

impl RampPlan {
    /// Plan the ramp for the first observed error.
    ///
    /// The staircase needs `ramp >= 2k`, where `k` is the number of levels for
    /// `|err|` (largest `k` with `k(k+1)/2 <= |err|`). Shorter ramps apply the
    /// whole error in one step: an error of 15 has `k = 5` and needs a ramp of
    /// at least 10.
    pub fn new(err: f64, ramp: u32) -> Self {
        let e = crate::util::round_to_i64(err);
        let magnitude = e.unsigned_abs();
        let sign = e.signum();

        if ramp <= 1 {
            return Self::single_step(e);
        }
        let levels = staircase_levels(magnitude);
        if levels == 0 {
            return Self::single_step(e);
        }
        let niter = u64::from(ramp) / (2 * levels);
        if niter == 0 {
            tracing::debug!(
                ramp,
                err = e,
                levels,
                "ramp too short for a staircase, applying the error in one step"
            );
            return Self::single_step(e);
        }

        let triangle = levels * (levels + 1) / 2;
        let planned = levels + (magnitude - triangle);
        let total_steps = levels * (niter + 1);
        tracing::info!(ramp, err = e, levels, niter, "initializing ramp plan");
        Self {
            sign,
            planned_step: sign * to_i64(planned),
            levels,
            niter,
            level: levels,
            sub: 0,
            emitted: 0,
            total_steps,
        }
    }

    fn single_step(e: i64) -> Self {
        Self {
            sign: e.signum(),
            planned_step: e,
            levels: 1,
            niter: 0,
            level: 1,
            sub: 0,
            emitted: 0,
            total_steps: 1,
        }
    }

    /// Largest single correction the plan will emit as a level total.
    pub fn planned_step(&self) -> i64 {
        self.planned_step
    }

    /// Number of values emitted before the plan turns into zeros.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Planned values not emitted yet.
    pub fn remaining(&self) -> u64 {
        self.total_steps - self.emitted
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Unsigned value of the current level; the first level carries the
    /// triangle remainder.
    fn level_value(&self) -> u64 {
        if self.level == self.levels {
            self.planned_step.unsigned_abs()
        } else {
            self.level
        }
    }

    fn step(&mut self) -> i64 {
        if self.niter == 0 {
            self.level = 0;
            return self.planned_step;
        }
        let value = self.level_value();
        let per_sub = value / self.niter;
        let out = if self.sub < self.niter {
            per_sub
        } else {
            value - per_sub * self.niter
        };
        if self.sub == self.niter {
            self.sub = 0;
            self.level -= 1;
        } else {
            self.sub += 1;
        }
        self.sign * to_i64(out)
    }
}

impl Iterator for RampPlan {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.is_exhausted() {
            return Some(0);
        }
        let v = self.step();
        self.emitted += 1;
        Some(v)
    }
}

/// Largest `k` with `k(k+1)/2 <= n`.
fn staircase_levels(n: u64) -> u64 {
    // Positive root of 0.5k^2 + 0.5k - n = 0, then corrected for float error.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut k = ((2.0 * n as f64 + 0.25).sqrt() - 0.5).floor().max(0.0) as u64;
    let tri = |k: u64| u128::from(k) * (u128::from(k) + 1) / 2;
    while k > 0 && tri(k) > u128::from(n) {
        k -= 1;
    }
    while tri(k + 1) <= u128::from(n) {
        k += 1;
    }
    k
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(plan: &mut RampPlan, n: usize) -> Vec<i64> {
        plan.by_ref().take(n).collect()
    }

    #[test]
    fn levels_are_triangular() {
        assert_eq!(staircase_levels(0), 0);
        assert_eq!(staircase_levels(1), 1);
        assert_eq!(staircase_levels(2), 1);
        assert_eq!(staircase_levels(3), 2);
        assert_eq!(staircase_levels(14), 4);
        assert_eq!(staircase_levels(15), 5);
        assert!(staircase_levels(u64::MAX) > 0);
    }

    #[test]
    fn fifteen_over_ten_ticks_is_a_staircase() {
        let mut plan = RampPlan::new(15.0, 10);
        assert_eq!(plan.total_steps(), 10);
        assert_eq!(plan.planned_step(), 5);
        assert_eq!(take(&mut plan, 12), vec![5, 0, 4, 0, 3, 0, 2, 0, 1, 0, 0, 0]);
        assert!(plan.is_exhausted());
    }

    #[test]
    fn sub_steps_split_each_level() {
        // 3 levels, niter = 12 / 6 = 2
        let mut plan = RampPlan::new(-7.0, 12);
        assert_eq!(plan.planned_step(), -4);
        let n = usize::try_from(plan.total_steps()).unwrap();
        let got = take(&mut plan, n);
        assert_eq!(got, vec![-2, -2, 0, -1, -1, 0, 0, 0, -1]);
        assert_eq!(got.iter().sum::<i64>(), -7);
    }

    #[test]
    fn short_ramp_falls_back_to_single_step() {
        let mut plan = RampPlan::new(100.0, 3);
        assert_eq!(plan.total_steps(), 1);
        assert_eq!(take(&mut plan, 3), vec![100, 0, 0]);
    }

    #[test]
    fn one_tick_below_twice_the_levels_is_a_single_step() {
        // 15 has five levels, so a ramp of 9 is one short of a staircase.
        let mut plan = RampPlan::new(15.0, 9);
        assert_eq!(plan.total_steps(), 1);
        assert_eq!(plan.planned_step(), 15);
        assert_eq!(take(&mut plan, 3), vec![15, 0, 0]);
    }

    #[test]
    fn zero_error_emits_zero() {
        let mut plan = RampPlan::new(0.2, 50);
        assert_eq!(take(&mut plan, 3), vec![0, 0, 0]);
    }
}
