use std::sync::Arc;

use relay_core::error::BuildError;
use relay_core::mocks::RecordingAction;
use relay_core::{ControlLoop, NullSink};
use relay_traits::IterSource;
use rstest::rstest;

fn constant(v: f64) -> IterSource<std::iter::Repeat<f64>> {
    IterSource::new(std::iter::repeat(v))
}

fn expect_build_error(err: &relay_core::Report) -> &BuildError {
    err.downcast_ref::<BuildError>()
        .unwrap_or_else(|| panic!("expected BuildError, got: {err:?}"))
}

#[rstest]
fn missing_metric_yields_typed_build_error() {
    let err = ControlLoop::builder()
        .with_target(constant(1.0))
        .with_warmer(Arc::new(RecordingAction::new()))
        .try_build()
        .expect_err("should fail with MissingMetric");
    assert_eq!(expect_build_error(&err), &BuildError::MissingMetric);
}

#[rstest]
fn missing_target_yields_typed_build_error() {
    let err = ControlLoop::builder()
        .with_metric(constant(1.0))
        .with_cooler(Arc::new(RecordingAction::new()))
        .try_build()
        .expect_err("should fail with MissingTarget");
    assert_eq!(expect_build_error(&err), &BuildError::MissingTarget);
}

#[rstest]
fn no_warmer_or_cooler_is_rejected() {
    let err = ControlLoop::builder()
        .with_metric(constant(1.0))
        .with_target(constant(1.0))
        .build()
        .expect_err("should fail with MissingAction");
    assert_eq!(expect_build_error(&err), &BuildError::MissingAction);
}

#[rstest]
#[case(0, 1, "lookback must be >= 2")]
#[case(1, 1, "lookback must be >= 2")]
#[case(1 << 40, 1, "lookback must be <= 1000000")]
#[case(10, 0, "ramp must be >= 1")]
fn invalid_tuning_is_rejected(#[case] lookback: usize, #[case] ramp: u32, #[case] msg: &str) {
    let err = ControlLoop::builder()
        .with_metric(constant(1.0))
        .with_target(constant(1.0))
        .with_warmer(Arc::new(RecordingAction::new()))
        .with_lookback(lookback)
        .with_ramp(ramp)
        .build()
        .expect_err("invalid tuning must fail");
    match expect_build_error(&err) {
        BuildError::InvalidConfig(m) => assert_eq!(*m, msg),
        other => panic!("unexpected: {other:?}"),
    }
}

#[rstest]
fn cooler_only_builds() {
    let control = ControlLoop::builder()
        .with_metric(constant(1.0))
        .with_target(constant(1.0))
        .with_cooler(Arc::new(RecordingAction::new()))
        .with_lookback(2)
        .with_telemetry(NullSink)
        .build()
        .unwrap();
    assert_eq!(control.ticks(), 0);
    assert!(control.window().is_empty());
}
