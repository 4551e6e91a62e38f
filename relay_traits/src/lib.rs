//! Capability interfaces shared by the control core and the plugins.
//!
//! A controller is wired from four capabilities: two [`Source`]s (metric and
//! target), up to two [`Action`]s (warmer and cooler) and an optional
//! [`StopCondition`]. Errors cross these boundaries as boxed trait objects;
//! `relay_core` maps them to its typed error enum.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type used at every plugin boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An infinite, non-restartable stream of readings (PV or SP).
///
/// `next_value` may block for as long as the plugin's own retrieval takes.
pub trait Source: Send {
    fn next_value(&mut self) -> Result<f64, BoxError>;
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn next_value(&mut self) -> Result<f64, BoxError> {
        (**self).next_value()
    }
}

/// A warmer or cooler. Receives the signed correction magnitude for one tick.
pub trait Action: Send + Sync {
    fn apply(&self, magnitude: i64) -> Result<(), BoxError>;
}

impl<A: Action + ?Sized> Action for std::sync::Arc<A> {
    fn apply(&self, magnitude: i64) -> Result<(), BoxError> {
        (**self).apply(magnitude)
    }
}

/// Outcome of a stop-condition evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    Continue,
    Exit(i32),
}

impl StopDecision {
    /// Exit code a plugin returns to keep the loop running.
    pub const CONTINUE_SENTINEL: i32 = -1;

    /// Interpret a raw plugin return code.
    pub fn from_code(code: i32) -> Self {
        if code == Self::CONTINUE_SENTINEL {
            StopDecision::Continue
        } else {
            StopDecision::Exit(code)
        }
    }
}

/// Inspects the error history once per tick and decides whether to exit.
pub trait StopCondition: Send {
    fn evaluate(&mut self, errors: &[f64]) -> Result<StopDecision, BoxError>;
}

impl<C: StopCondition + ?Sized> StopCondition for Box<C> {
    fn evaluate(&mut self, errors: &[f64]) -> Result<StopDecision, BoxError> {
        (**self).evaluate(errors)
    }
}

/// Adapts any `f64` iterator into a [`Source`].
///
/// Sources are infinite by contract, so running out of items is an error.
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I> Source for IterSource<I>
where
    I: Iterator<Item = f64> + Send,
{
    fn next_value(&mut self) -> Result<f64, BoxError> {
        self.inner
            .next()
            .ok_or_else(|| "source exhausted: iterator returned no value".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_decision_sentinel() {
        assert_eq!(StopDecision::from_code(-1), StopDecision::Continue);
        assert_eq!(StopDecision::from_code(0), StopDecision::Exit(0));
        assert_eq!(StopDecision::from_code(2), StopDecision::Exit(2));
    }

    #[test]
    fn iter_source_reports_exhaustion() {
        let mut src = IterSource::new(vec![1.0, 2.0].into_iter());
        assert_eq!(src.next_value().unwrap(), 1.0);
        assert_eq!(src.next_value().unwrap(), 2.0);
        let err = src.next_value().unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }

    #[test]
    fn boxed_source_forwards() {
        let mut src: Box<dyn Source> = Box::new(IterSource::new(std::iter::repeat(5.0)));
        assert_eq!(src.next_value().unwrap(), 5.0);
    }
}
