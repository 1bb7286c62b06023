use proptest::prelude::*;

use rs_valve::{
    hal::{MockConfigStore, MockValve, ValveMechanics},
    valve::target_position,
    CalibrationRequest, CalibrationStep, ManualCalibration, ValveConfig, ValveController,
    MIN_TRAVEL_PULSES, POSITION_UNKNOWN,
};

proptest! {
    #[test]
    fn goto_targets_are_monotonic_and_inside_end_targets(max in MIN_TRAVEL_PULSES..=i16::MAX) {
        let config = ValveConfig::default();
        let closed = target_position(0, max, &config);
        let open = target_position(100, max, &config);
        // Below 120 pulses a quarter of the usable travel is under 25 steps,
        // so neighbouring percentages can share a target
        let strict = max >= 120;

        let mut previous = closed;
        for percent in 1..=99u8 {
            let target = target_position(percent, max, &config);
            prop_assert!(target > closed && target < open,
                "{}% -> {} not inside ({}, {})", percent, target, closed, open);
            if strict {
                prop_assert!(target > previous, "{}% -> {} not above {}", percent, target, previous);
            } else {
                prop_assert!(target >= previous, "{}% -> {} below {}", percent, target, previous);
            }
            previous = target;
        }
    }

    #[test]
    fn position_unknown_for_tiny_or_incomplete_calibration(travel in 1i16..=10, requests in 0usize..6) {
        // Fixed travel of ten pulses or less never reports a percentage
        let config = ValveConfig::default().with_manual_calibration(ManualCalibration::Fixed(travel));
        let mut c = ValveController::new(MockValve::new(), MockConfigStore::new(config));
        prop_assert_eq!(c.position_percent(), POSITION_UNKNOWN);

        for _ in 0..requests {
            c.update_calibration(CalibrationRequest::Tick, 0).unwrap();
            prop_assert_eq!(c.position_percent(), POSITION_UNKNOWN);
        }
        while !c.calibration_step().is_running() {
            c.update_calibration(CalibrationRequest::Tick, 0).unwrap();
        }
        ValveMechanics::new(travel).run_until_idle(&mut c, 1_000_000).unwrap();
        prop_assert_eq!(c.calibration_step(), CalibrationStep::Done);
        prop_assert_eq!(c.position_percent(), POSITION_UNKNOWN);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn calibration_round_trip_measures_travel(travel in 100i16..=600) {
        let mut c = ValveController::new(MockValve::new(), MockConfigStore::default());
        let mut valve = ValveMechanics::new(travel);

        while !c.calibration_step().is_running() {
            c.update_calibration(CalibrationRequest::Tick, 0).unwrap();
        }
        valve.run_until_idle(&mut c, 2_000_000).unwrap();

        prop_assert_eq!(c.calibration_step(), CalibrationStep::Done);
        prop_assert_eq!(c.max_position(), travel);
        prop_assert_eq!(c.position(), 0);
        prop_assert!(c.errors().is_empty());
    }
}
