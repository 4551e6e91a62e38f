//! `From` implementations bridging `relay_config` types to `relay_core` types.

use crate::config::{DispatchMode, LoopCfg, WeightMode};

impl From<relay_config::DispatchMode> for DispatchMode {
    fn from(m: relay_config::DispatchMode) -> Self {
        match m {
            relay_config::DispatchMode::Detached => DispatchMode::Detached,
            relay_config::DispatchMode::Blocking => DispatchMode::Blocking,
        }
    }
}

impl From<relay_config::WeightMode> for WeightMode {
    fn from(m: relay_config::WeightMode) -> Self {
        match m {
            relay_config::WeightMode::Raw => WeightMode::Raw,
            relay_config::WeightMode::RunningMax => WeightMode::RunningMax,
        }
    }
}

/// Invalid delays (negative, non-finite) map to zero here; `Config::validate`
/// rejects them before this conversion runs.
impl From<&relay_config::ControlCfg> for LoopCfg {
    fn from(c: &relay_config::ControlCfg) -> Self {
        Self {
            delay: crate::util::delay_from_secs(c.delay_s),
            lookback: c.lookback,
            ramp: c.ramp,
            dispatch: c.dispatch.into(),
            weight: c.weight.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn control_section_converts() {
        let cfg = relay_config::load_toml(
            r#"
            [control]
            delay = 0.25
            lookback = 20
            ramp = 8
            dispatch = "blocking"
            weight = "running_max"
            "#,
        )
        .unwrap();
        let lc = LoopCfg::from(&cfg.control);
        assert_eq!(lc.delay, Duration::from_millis(250));
        assert_eq!(lc.lookback, 20);
        assert_eq!(lc.ramp, 8);
        assert_eq!(lc.dispatch, DispatchMode::Blocking);
        assert_eq!(lc.weight, WeightMode::RunningMax);
    }
}
