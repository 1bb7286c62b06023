//! Edge case and boundary condition tests for the valve controller

use rs_valve::{
    hal::{MockConfigStore, MockValve},
    CalibrationRequest, CalibrationStep, Direction, EyeState, ManualCalibration, TaskFlags,
    TickOutcome, ValveConfig, ValveController, ValveError, POSITION_UNKNOWN,
};

type Controller = ValveController<MockValve, MockConfigStore>;

fn controller(config: ValveConfig) -> Controller {
    ValveController::new(MockValve::new(), MockConfigStore::new(config))
}

/// Wait out the noise window, then deliver one rising edge.
fn pulse(c: &mut Controller) -> bool {
    for _ in 0..5 {
        c.on_timer_tick().unwrap();
    }
    c.on_eye_sample(false);
    c.on_eye_sample(true)
}

fn pulses(c: &mut Controller, n: i16) {
    for _ in 0..n {
        assert!(pulse(c));
    }
}

/// Run the timer into its timeout and hand the stop to the task loop.
fn expire(c: &mut Controller) {
    while c.on_timer_tick().unwrap() == TickOutcome::Running {}
    let flags = c.run_pending().unwrap();
    assert!(flags.contains(TaskFlags::STOP));
}

fn start_calibration(c: &mut Controller) {
    while !c.calibration_step().is_running() {
        c.update_calibration(CalibrationRequest::Tick, 0).unwrap();
    }
}

fn calibrated(travel: i16) -> Controller {
    let mut c = controller(ValveConfig::default());
    start_calibration(&mut c);
    pulses(&mut c, travel);
    expire(&mut c);
    pulses(&mut c, travel);
    expire(&mut c);
    assert_eq!(c.calibration_step(), CalibrationStep::Done);
    c
}

// ============================================================================
// Boundary Value Tests
// ============================================================================

#[test]
fn goto_accepts_zero_and_hundred() {
    let mut c = calibrated(300);
    assert!(c.goto(0).is_ok());
    assert!(c.goto(100).is_ok());
}

#[test]
fn goto_rejects_above_hundred() {
    let mut c = calibrated(300);
    let before = c.stop_position();

    assert_eq!(c.goto(101), Err(ValveError::InvalidPercent(101)));
    assert_eq!(c.goto(u8::MAX), Err(ValveError::InvalidPercent(255)));
    assert_eq!(c.stop_position(), before);
    assert_eq!(c.direction(), Direction::Stop);
}

#[test]
fn percent_clamped_below_closed_end() {
    let mut c = calibrated(300);
    c.goto(0).unwrap();
    assert_eq!(c.direction(), Direction::Close);

    // No end-stop where expected: counts down to the target instead
    pulses(&mut c, 10);
    assert_eq!(c.position(), -10);
    assert_eq!(c.position_percent(), 0);
}

#[test]
fn percent_clamped_above_open_end() {
    let mut c = calibrated(300);
    c.goto(100).unwrap();
    pulses(&mut c, 310);
    assert_eq!(c.position(), 310);
    assert_eq!(c.position_percent(), 100);
}

#[test]
fn percent_unknown_at_ten_pulse_travel() {
    for (travel, expected_unknown) in [(10, true), (11, false)] {
        let mut c = controller(
            ValveConfig::default().with_manual_calibration(ManualCalibration::Fixed(travel)),
        );
        start_calibration(&mut c);
        pulses(&mut c, 3);
        expire(&mut c);

        assert_eq!(c.calibration_step(), CalibrationStep::Done);
        assert_eq!(c.max_position(), travel);
        assert_eq!(c.position_percent() == POSITION_UNKNOWN, expected_unknown);
    }
}

#[test]
fn percent_unknown_while_calibrating() {
    let mut c = controller(ValveConfig::default());
    start_calibration(&mut c);
    pulses(&mut c, 50);
    assert_eq!(c.position_percent(), POSITION_UNKNOWN);
    assert!(!c.is_calibrated());
}

// ============================================================================
// Motor Driver Tests
// ============================================================================

#[test]
fn repeated_direction_is_idempotent() {
    let mut c = controller(ValveConfig::default());
    c.control(Direction::Close).unwrap();
    for _ in 0..100 {
        c.on_timer_tick().unwrap();
    }
    let calls = c.hardware().calls;
    let countdown = c.pulse_monitor().countdown();

    c.control(Direction::Close).unwrap();
    assert_eq!(c.hardware().calls, calls);
    // Timeout is not re-armed either
    assert_eq!(c.pulse_monitor().countdown(), countdown);
}

#[test]
fn reversal_rearms_timeout_and_noise_window() {
    let mut c = controller(ValveConfig::default());
    c.control(Direction::Open).unwrap();
    for _ in 0..100 {
        c.on_timer_tick().unwrap();
    }
    assert_eq!(c.pulse_monitor().eye_state(), EyeState::Ready);

    c.control(Direction::Close).unwrap();
    assert_eq!(c.hardware().bridge, Direction::Close);
    assert_eq!(c.pulse_monitor().countdown(), 512);
    assert_eq!(c.pulse_monitor().eye_state(), EyeState::Debouncing(5));
}

#[test]
fn stop_is_never_skipped() {
    let mut c = controller(ValveConfig::default());
    let mut last = c.hardware().calls;
    for _ in 0..3 {
        c.control(Direction::Stop).unwrap();
        assert!(c.hardware().calls > last);
        last = c.hardware().calls;
    }
}

#[test]
fn pulses_ignored_while_stopped() {
    let mut c = controller(ValveConfig::default());
    for _ in 0..10 {
        assert!(!c.on_eye_sample(false));
        assert!(!c.on_eye_sample(true));
    }
    assert_eq!(c.position(), 0);
    assert!(c.take_tasks().is_empty());
}

// ============================================================================
// Timeout and Task Tests
// ============================================================================

#[test]
fn expired_tick_keeps_cutting_power_until_handled() {
    let mut c = controller(ValveConfig::default());
    c.control(Direction::Open).unwrap();
    while c.on_timer_tick().unwrap() == TickOutcome::Running {}
    assert_eq!(c.on_timer_tick().unwrap(), TickOutcome::Expired);
    assert_eq!(c.hardware().fast_stops, 2);

    c.run_pending().unwrap();
    assert!(!c.hardware().tick_enabled);
    assert_eq!(c.direction(), Direction::Stop);
}

#[test]
fn run_pending_without_tasks() {
    let mut c = controller(ValveConfig::default());
    assert!(c.run_pending().unwrap().is_empty());
    assert_eq!(c.hardware().calls, 0);
}

#[test]
fn stop_event_while_stopped_is_harmless() {
    let mut c = calibrated(300);
    let max = c.max_position();
    c.run_tasks(TaskFlags::STOP).unwrap();

    assert_eq!(c.max_position(), max);
    assert_eq!(c.position(), 0);
    assert_eq!(c.calibration_step(), CalibrationStep::Done);
}

#[test]
fn unmount_drops_stale_stop() {
    let mut c = controller(ValveConfig::default());
    start_calibration(&mut c);
    while c.on_timer_tick().unwrap() == TickOutcome::Running {}

    c.update_calibration(CalibrationRequest::Unmounted, 0)
        .unwrap();
    assert!(c.run_pending().unwrap().is_empty());
    assert_eq!(c.calibration_step(), CalibrationStep::Uninitialized);

    c.update_calibration(CalibrationRequest::Tick, 0).unwrap();
    assert_eq!(c.calibration_step().as_i8(), 1);
}

#[test]
fn calibration_wait_of_zero_launches_next_request() {
    let mut c = controller(ValveConfig::default().with_calibration_wait(0));
    c.update_calibration(CalibrationRequest::Tick, 0).unwrap();
    assert_eq!(c.calibration_step().as_i8(), 1);
    assert_eq!(c.direction(), Direction::Stop);

    c.update_calibration(CalibrationRequest::Tick, 0).unwrap();
    assert_eq!(c.calibration_step().as_i8(), 3);
    assert_eq!(c.direction(), Direction::Open);
}

#[test]
fn requests_during_a_leg_do_not_disturb_it() {
    let mut c = controller(ValveConfig::default());
    start_calibration(&mut c);
    pulses(&mut c, 20);

    for request in [
        CalibrationRequest::Tick,
        CalibrationRequest::SwitchToAuto,
        CalibrationRequest::SwitchToManual,
    ] {
        c.update_calibration(request, 90).unwrap();
    }
    assert_eq!(c.calibration_step(), CalibrationStep::FirstLeg);
    assert_eq!(c.direction(), Direction::Open);
    assert_eq!(c.position(), 20);
    assert!(c.store().persisted.is_empty());
}
