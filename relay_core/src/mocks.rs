//! Test and helper mocks for relay_core.
use std::sync::{Arc, Mutex};

use relay_traits::{Action, BoxError, StopCondition, StopDecision};

/// Records every magnitude it is asked to apply. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingAction {
    calls: Arc<Mutex<Vec<i64>>>,
}

impl RecordingAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Magnitudes received so far, in call order.
    pub fn calls(&self) -> Vec<i64> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Action for RecordingAction {
    fn apply(&self, magnitude: i64) -> Result<(), BoxError> {
        if let Ok(mut c) = self.calls.lock() {
            c.push(magnitude);
        }
        Ok(())
    }
}

/// Fails (or panics) on every call.
#[derive(Debug, Clone)]
pub struct FailingAction {
    message: String,
    panic: bool,
}

impl FailingAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panic: false,
        }
    }

    pub fn panicking() -> Self {
        Self {
            message: "action panicked".into(),
            panic: true,
        }
    }
}

impl Action for FailingAction {
    fn apply(&self, _magnitude: i64) -> Result<(), BoxError> {
        if self.panic {
            panic!("{}", self.message);
        }
        Err(self.message.clone().into())
    }
}

/// Returns scripted raw codes, one per evaluation, then keeps returning the
/// continue sentinel. Also records the error slices it was shown.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStop {
    codes: Vec<i32>,
    seen: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl ScriptedStop {
    pub fn new(codes: Vec<i32>) -> Self {
        Self {
            codes,
            seen: Arc::default(),
        }
    }

    pub fn seen(&self) -> Vec<Vec<f64>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl StopCondition for ScriptedStop {
    fn evaluate(&mut self, errors: &[f64]) -> Result<StopDecision, BoxError> {
        let n = match self.seen.lock() {
            Ok(mut s) => {
                s.push(errors.to_vec());
                s.len()
            }
            Err(_) => return Err("scripted stop state poisoned".into()),
        };
        let code = self
            .codes
            .get(n - 1)
            .copied()
            .unwrap_or(StopDecision::CONTINUE_SENTINEL);
        Ok(StopDecision::from_code(code))
    }
}
