use std::sync::Arc;
use std::time::Duration;

use relay_core::mocks::{FailingAction, RecordingAction, ScriptedStop};
use relay_core::{
    ControlLoop, DispatchMode, DispatchOutcome, JsonlSink, NullSink, Phase, PluginRole,
    RelayError, TickStatus,
};
use relay_traits::clock::test_clock::TestClock;
use relay_traits::{IterSource, Source};

fn repeat(v: f64) -> IterSource<std::iter::Repeat<f64>> {
    IterSource::new(std::iter::repeat(v))
}

fn seq(v: Vec<f64>) -> IterSource<std::vec::IntoIter<f64>> {
    IterSource::new(v.into_iter())
}

struct Harness {
    control: ControlLoop,
    warmer: RecordingAction,
    cooler: RecordingAction,
    clock: TestClock,
}

fn harness(
    metric: impl Source + 'static,
    target: impl Source + 'static,
    ramp: u32,
    lookback: usize,
) -> Harness {
    let warmer = RecordingAction::new();
    let cooler = RecordingAction::new();
    let clock = TestClock::new();
    let control = ControlLoop::builder()
        .with_metric(metric)
        .with_target(target)
        .with_warmer(Arc::new(warmer.clone()))
        .with_cooler(Arc::new(cooler.clone()))
        .with_ramp(ramp)
        .with_lookback(lookback)
        .with_delay(Duration::from_millis(250))
        .with_dispatch(DispatchMode::Blocking)
        .with_telemetry(NullSink)
        .with_clock(clock.clone())
        .build()
        .unwrap();
    Harness {
        control,
        warmer,
        cooler,
        clock,
    }
}

fn continue_report(status: TickStatus) -> relay_core::TickReport {
    match status {
        TickStatus::Continue(r) => r,
        TickStatus::Stop { code, .. } => panic!("unexpected stop with code {code}"),
    }
}

#[test]
fn matched_setpoint_stabilizes_every_tick() {
    let mut h = harness(repeat(5.0), repeat(5.0), 1, 10);
    for _ in 0..25 {
        let r = continue_report(h.control.tick().unwrap());
        assert_eq!(r.err, 0.0);
        assert_eq!(r.mv, 0);
        assert_eq!(r.dispatched, DispatchOutcome::Stabilized);
    }
    assert!(h.warmer.calls().is_empty());
    assert!(h.cooler.calls().is_empty());
    assert_eq!(h.control.window().len(), 10);
}

#[test]
fn cold_start_applies_error_once_then_weights() {
    let mut h = harness(repeat(0.0), repeat(10.0), 1, 10);
    let first = continue_report(h.control.tick().unwrap());
    assert_eq!(first.phase, Phase::Ramping);
    assert_eq!(first.mv, 10);
    assert_eq!(first.weight, None);
    assert_eq!(h.warmer.calls(), vec![10]);
    assert_eq!(h.control.window(), &[0.0]);

    for _ in 0..30 {
        let r = continue_report(h.control.tick().unwrap());
        assert_eq!(r.phase, Phase::Steady);
        let w = r.weight.unwrap();
        assert!(w.is_finite());
        // err = 10 and the window mean is within [0, 10], |weight| <= 1
        assert!((-10..=20).contains(&r.mv), "mv {} out of bounds", r.mv);
    }
    assert!(h.cooler.calls().iter().all(|mv| *mv < 0));
}

#[test]
fn ramping_pushes_zeros_into_window() {
    let mut h = harness(repeat(0.0), repeat(15.0), 10, 32);
    let mut emitted = Vec::new();
    for _ in 0..10 {
        let r = continue_report(h.control.tick().unwrap());
        assert_eq!(r.phase, Phase::Ramping);
        emitted.push(r.mv);
    }
    assert_eq!(emitted, vec![5, 0, 4, 0, 3, 0, 2, 0, 1, 0]);
    assert_eq!(h.control.window(), &[0.0; 10]);
    assert_eq!(h.warmer.calls(), vec![5, 4, 3, 2, 1]);

    let r = continue_report(h.control.tick().unwrap());
    assert_eq!(r.phase, Phase::Steady);
    assert!(h.control.ramp_plan().is_none());
    assert_eq!(h.control.window().last(), Some(&15.0));
}

#[test]
fn ramp_plan_is_built_from_first_error_only() {
    // Error changes after the first tick; the plan keeps the original 15.
    let mut h = harness(seq(vec![0.0, 100.0, 100.0, 100.0]), repeat(15.0), 10, 8);
    h.control.tick().unwrap();
    assert_eq!(h.control.ramp_plan().unwrap().planned_step(), 5);
    h.control.tick().unwrap();
    h.control.tick().unwrap();
    assert_eq!(h.warmer.calls(), vec![5, 4]);
}

#[test]
fn positive_mv_only_touches_warmer() {
    let mut h = harness(repeat(3.0), repeat(10.0), 1, 4);
    let r = continue_report(h.control.tick().unwrap());
    assert_eq!(r.mv, 7);
    assert_eq!(h.warmer.calls(), vec![7]);
    assert!(h.cooler.calls().is_empty());
}

#[test]
fn negative_mv_only_touches_cooler() {
    let mut h = harness(repeat(6.0), repeat(2.0), 1, 4);
    let r = continue_report(h.control.tick().unwrap());
    assert_eq!(r.mv, -4);
    assert_eq!(r.dispatched, DispatchOutcome::Cooler);
    assert_eq!(h.cooler.calls(), vec![-4]);
    assert!(h.warmer.calls().is_empty());
}

#[test]
fn steady_mv_subtracts_weighted_mean() {
    // Two samples: weight falls back to 1, so MV = err - mean.
    let mut h = harness(seq(vec![0.0, 4.0]), repeat(10.0), 1, 4);
    h.control.tick().unwrap();
    let r = continue_report(h.control.tick().unwrap());
    assert_eq!(r.weight, Some(1.0));
    assert_eq!(r.err, 6.0);
    assert_eq!(r.mean, 3.0);
    assert_eq!(r.mv, 3);
}

#[test]
fn stop_code_ends_after_dispatch_and_sleep() {
    let stop = ScriptedStop::new(vec![-1, -1, 2, 5]);
    let warmer = RecordingAction::new();
    let clock = TestClock::new();
    let mut control = ControlLoop::builder()
        .with_metric(repeat(0.0))
        .with_target(repeat(3.0))
        .with_warmer(Arc::new(warmer.clone()))
        .with_dispatch(DispatchMode::Blocking)
        .with_stop_condition(stop.clone())
        .with_delay(Duration::from_secs(2))
        .with_telemetry(NullSink)
        .with_clock(clock.clone())
        .build()
        .unwrap();

    assert!(matches!(control.tick().unwrap(), TickStatus::Continue(_)));
    assert!(matches!(control.tick().unwrap(), TickStatus::Continue(_)));
    let last = control.tick().unwrap();
    assert_eq!(last.exit_code(), Some(2));
    assert_eq!(last.report().tick, 2);
    assert_eq!(warmer.calls().len(), 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 3]);
    // The stop condition saw the window after each push.
    assert_eq!(stop.seen().len(), 3);
    assert_eq!(stop.seen()[2].len(), 3);
}

#[test]
fn delay_is_slept_every_tick() {
    let mut h = harness(repeat(1.0), repeat(1.0), 1, 4);
    for _ in 0..4 {
        h.control.tick().unwrap();
    }
    assert_eq!(h.clock.sleeps(), vec![Duration::from_millis(250); 4]);
}

#[test]
fn exhausted_metric_is_fatal() {
    let mut h = harness(seq(vec![1.0]), repeat(1.0), 1, 4);
    h.control.tick().unwrap();
    let err = h.control.tick().unwrap_err();
    assert_eq!(
        err.downcast_ref::<RelayError>(),
        Some(&RelayError::Exhausted {
            role: PluginRole::Metric
        })
    );
}

#[test]
fn non_finite_target_is_fatal() {
    let mut h = harness(repeat(1.0), repeat(f64::INFINITY), 1, 4);
    let err = h.control.tick().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RelayError>(),
        Some(RelayError::NonFinite {
            role: PluginRole::Target,
            ..
        })
    ));
    assert!(h.warmer.calls().is_empty());
}

#[test]
fn overflowing_error_is_fatal() {
    // Both readings are finite but SP - PV is not.
    let mut h = harness(repeat(-1e308), repeat(1e308), 1, 4);
    let err = h.control.tick().unwrap_err();
    assert_eq!(
        err.downcast_ref::<RelayError>(),
        Some(&RelayError::ErrorOverflow {
            sp: 1e308,
            pv: -1e308
        })
    );
    assert!(h.control.window().is_empty());
    assert!(h.warmer.calls().is_empty());
    assert!(h.cooler.calls().is_empty());
}

#[test]
fn detached_failure_stops_the_next_tick() {
    let mut control = ControlLoop::builder()
        .with_metric(repeat(0.0))
        .with_target(repeat(1.0))
        .with_warmer(Arc::new(FailingAction::new("scale-up rejected")))
        .with_dispatch(DispatchMode::Detached)
        .with_delay(Duration::ZERO)
        .with_telemetry(NullSink)
        .with_clock(TestClock::new())
        .build()
        .unwrap();
    control.tick().unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let err = loop {
        match control.tick() {
            Err(e) => break e,
            Ok(_) if std::time::Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(_) => panic!("detached failure never surfaced"),
        }
    };
    assert!(format!("{err:#}").contains("scale-up rejected"));
}

#[test]
fn telemetry_receives_each_tick() {
    let file = tempfile::NamedTempFile::new().unwrap();
    {
        let mut control = ControlLoop::builder()
            .with_metric(repeat(2.0))
            .with_target(repeat(4.0))
            .with_warmer(Arc::new(RecordingAction::new()))
            .with_dispatch(DispatchMode::Blocking)
            .with_delay(Duration::ZERO)
            .with_telemetry(JsonlSink::create(file.path()).unwrap())
            .with_clock(TestClock::new())
            .build()
            .unwrap();
        for _ in 0..3 {
            control.tick().unwrap();
        }
    }
    let text = std::fs::read_to_string(file.path()).unwrap();
    let rows: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["phase"], "ramping");
    assert_eq!(rows[0]["mv"], 2);
    assert!(rows[0]["weight"].is_null());
    for key in ["pv", "sp", "err", "weight", "mv"] {
        assert!(rows[2].get(key).is_some(), "missing {key}");
    }
}
