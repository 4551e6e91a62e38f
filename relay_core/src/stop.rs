//! Optional stop-condition wrapper.
use eyre::WrapErr;
use relay_traits::{StopCondition, StopDecision};

use crate::error::{PluginRole, Result};
use crate::plugin_error::map_plugin_error;

/// Evaluates the configured stop condition, if any, once per tick.
#[derive(Default)]
pub struct StopEvaluator {
    inner: Option<Box<dyn StopCondition>>,
}

impl std::fmt::Debug for StopEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopEvaluator")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl StopEvaluator {
    pub fn new(inner: Option<Box<dyn StopCondition>>) -> Self {
        Self { inner }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    /// Ask the stop condition about the errors seen so far (oldest first).
    /// Without a stop condition the answer is always `Continue`.
    pub fn evaluate(&mut self, errors: &[f64]) -> Result<StopDecision> {
        let Some(cond) = self.inner.as_mut() else {
            return Ok(StopDecision::Continue);
        };
        let decision = cond
            .evaluate(errors)
            .map_err(|e| eyre::Report::new(map_plugin_error(PluginRole::StopCondition, &*e)))
            .wrap_err("evaluating stop condition")?;
        if let StopDecision::Exit(code) = decision {
            tracing::info!(
                return_code = code,
                "stop condition triggered, relay is terminating"
            );
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_traits::BoxError;

    struct ExitOnNonZero;

    impl StopCondition for ExitOnNonZero {
        fn evaluate(&mut self, errors: &[f64]) -> std::result::Result<StopDecision, BoxError> {
            if errors.iter().any(|e| *e != 0.0) {
                Ok(StopDecision::Exit(2))
            } else {
                Ok(StopDecision::Continue)
            }
        }
    }

    struct Broken;

    impl StopCondition for Broken {
        fn evaluate(&mut self, _errors: &[f64]) -> std::result::Result<StopDecision, BoxError> {
            Err("boom".into())
        }
    }

    #[test]
    fn unconfigured_always_continues() {
        let mut s = StopEvaluator::default();
        assert!(!s.is_configured());
        assert_eq!(s.evaluate(&[1.0, 2.0]).unwrap(), StopDecision::Continue);
    }

    #[test]
    fn forwards_decision() {
        let mut s = StopEvaluator::new(Some(Box::new(ExitOnNonZero)));
        assert_eq!(s.evaluate(&[0.0]).unwrap(), StopDecision::Continue);
        assert_eq!(s.evaluate(&[0.0, 3.0]).unwrap(), StopDecision::Exit(2));
    }

    #[test]
    fn plugin_failure_propagates() {
        let mut s = StopEvaluator::new(Some(Box::new(Broken)));
        let err = s.evaluate(&[]).unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }
}
