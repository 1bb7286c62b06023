//! Calibration state machine types.
//!
//! A calibration establishes the pulse count between the fully closed and
//! fully open end-stops. Depending on [`ManualCalibration`] it is either two
//! legs (run to one end-stop, then to the other) or a single leg that only
//! re-establishes the origin against a known travel.
//!
//! ```text
//!  Uninitialized ──request──▶ Pending(TwoLeg) ──wait──▶ FirstLeg ──end-stop──▶ FinalLeg ──end-stop──▶ Done
//!        │                    Pending(SingleLeg) ─wait──────────────────────▶ FinalLeg
//!        ▲                                                   │                    │
//!        └──── Unmounted ◀──── Error ◀──── target count reached (no end-stop) ────┘
//! ```
//!
//! The transitions themselves live in
//! [`ValveController`](crate::ValveController) because they drive the motor.

use crate::config::ManualCalibration;
use crate::traits::Direction;

/// Largest plausible valve travel, in pulses.
///
/// Calibration legs target this distance; counting it without hitting an
/// end-stop means the end-stop was missed.
pub const MAX_TRAVEL_PULSES: i16 = 1000;

/// Smallest plausible valve travel, in pulses.
pub const MIN_TRAVEL_PULSES: i16 = 100;

/// Number of end-stop runs a calibration needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CalibrationLegs {
    /// Measure both end-stops.
    TwoLeg,
    /// Travel is known; only the origin is established.
    SingleLeg,
}

/// Calibration progress.
///
/// [`as_i8`](Self::as_i8) gives the compact numeric code used in status
/// reports: −2, −1, 1, 2, 3, 4 and 0 for done.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CalibrationStep {
    /// Not calibrated, no calibration requested.
    #[default]
    Uninitialized,
    /// Last calibration failed. Only an unmount resets it.
    Error,
    /// Calibration requested, waiting for the request counter to run out.
    Pending(CalibrationLegs),
    /// Running towards the first end-stop of a two-leg calibration.
    FirstLeg,
    /// Running towards the last end-stop.
    FinalLeg,
    /// Calibrated.
    Done,
}

impl CalibrationStep {
    /// Numeric status code.
    pub const fn as_i8(self) -> i8 {
        match self {
            CalibrationStep::Uninitialized => -2,
            CalibrationStep::Error => -1,
            CalibrationStep::Pending(CalibrationLegs::TwoLeg) => 1,
            CalibrationStep::Pending(CalibrationLegs::SingleLeg) => 2,
            CalibrationStep::FirstLeg => 3,
            CalibrationStep::FinalLeg => 4,
            CalibrationStep::Done => 0,
        }
    }

    /// Pending step for a new calibration in the given mode.
    pub const fn pending_for(manual: ManualCalibration) -> Self {
        match manual {
            ManualCalibration::Unset => CalibrationStep::Pending(CalibrationLegs::TwoLeg),
            _ => CalibrationStep::Pending(CalibrationLegs::SingleLeg),
        }
    }

    /// Step entered when a pending calibration launches its first run.
    ///
    /// Non-pending steps are returned unchanged.
    pub const fn launched(self) -> Self {
        match self {
            CalibrationStep::Pending(CalibrationLegs::TwoLeg) => CalibrationStep::FirstLeg,
            CalibrationStep::Pending(CalibrationLegs::SingleLeg) => CalibrationStep::FinalLeg,
            other => other,
        }
    }

    /// Returns true once calibration finished successfully.
    #[inline]
    pub const fn is_done(self) -> bool {
        matches!(self, CalibrationStep::Done)
    }

    /// Returns true while a calibration leg is driving the motor.
    #[inline]
    pub const fn is_running(self) -> bool {
        matches!(self, CalibrationStep::FirstLeg | CalibrationStep::FinalLeg)
    }
}

/// Calibration request from the wider control system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CalibrationRequest {
    /// The valve was taken off: forget everything and stop.
    Unmounted = 0,
    /// Periodic request while idle; advances a pending calibration.
    Tick = 1,
    /// Force the automatic mode ([`ManualCalibration::Auto`]).
    SwitchToAuto = 2,
    /// Force the manual mode. Clears the stored travel
    /// ([`ManualCalibration::Unset`]) and persists it.
    SwitchToManual = 3,
}

/// Direction and stop target of the first calibration run.
///
/// With no travel stored and the valve last seen more than half open, the
/// nearer closed end-stop is approached first.
pub fn first_leg(manual: ManualCalibration, percent: u8) -> (Direction, i16) {
    if manual == ManualCalibration::Unset && percent > 50 {
        (Direction::Close, -MAX_TRAVEL_PULSES)
    } else {
        (Direction::Open, MAX_TRAVEL_PULSES)
    }
}
