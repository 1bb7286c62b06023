//! Valve position controller that ties everything together.
//!
//! This module provides [`ValveController`], the central component that
//! drives the motor, owns the pulse monitor and runs the calibration state
//! machine.
//!
//! # Overview
//!
//! The valve controller:
//! - Translates a requested valve position (0-100%) into motor commands
//! - Tracks the actual position from direction-signed feedback pulses
//! - Stops the motor on end-stop stall or after the target count
//! - Calibrates the travel range and reports out-of-range faults
//!
//! # Call Sites
//!
//! | Context | Calls |
//! |---------|-------|
//! | photo-eye interrupt | [`on_eye_sample`](ValveController::on_eye_sample) |
//! | timer interrupt | [`on_timer_tick`](ValveController::on_timer_tick) |
//! | task loop | [`take_tasks`](ValveController::take_tasks) + [`run_tasks`](ValveController::run_tasks) |
//! | control loop | [`goto`](ValveController::goto), [`update_calibration`](ValveController::update_calibration), [`position_percent`](ValveController::position_percent) |
//!
//! # Example
//!
//! ```rust
//! use rs_valve::{
//!     CalibrationRequest, CalibrationStep, ValveController,
//!     hal::{MockConfigStore, MockValve, ValveMechanics},
//! };
//!
//! let mut controller = ValveController::new(MockValve::new(), MockConfigStore::default());
//! let mut valve = ValveMechanics::new(400);
//!
//! // The control loop requests calibration until it has been launched
//! while !controller.calibration_step().is_running() {
//!     controller.update_calibration(CalibrationRequest::Tick, 0).unwrap();
//! }
//! valve.run_until_idle(&mut controller, 1_000_000).unwrap();
//! assert_eq!(controller.calibration_step(), CalibrationStep::Done);
//! assert_eq!(controller.max_position(), 400);
//!
//! controller.goto(50).unwrap();
//! valve.run_until_idle(&mut controller, 1_000_000).unwrap();
//! assert_eq!(controller.position_percent(), 50);
//! ```

use tracing::{debug, info, trace, warn};

use crate::calibration::{
    first_leg, CalibrationRequest, CalibrationStep, MAX_TRAVEL_PULSES, MIN_TRAVEL_PULSES,
};
use crate::config::{ConfigField, ManualCalibration, ValveConfig};
use crate::error::{ErrorFlags, ValveError};
use crate::pulse::{EyeState, PulseDiagnostic, PulseMonitor, TaskFlags, TickOutcome};
use crate::traits::{ConfigStore, Direction, ValveHardware};

/// Value reported by [`ValveController::position_percent`] while the valve
/// is not calibrated.
pub const POSITION_UNKNOWN: u8 = 255;

/// Stop position that corresponds to `percent` of a calibrated travel.
///
/// 0% and 100% overshoot past the protection margin by the hysteresis so the
/// valve settles on its end-stop. Intermediate positions are spread over the
/// travel minus the protection margin at each end. `percent` above 100 is
/// treated as 100.
///
/// ```
/// use rs_valve::{valve::target_position, ValveConfig};
///
/// let config = ValveConfig::default(); // hysteresis 20, protection 10
/// assert_eq!(target_position(0, 500, &config), -10);
/// assert_eq!(target_position(100, 500, &config), 510);
/// assert_eq!(target_position(50, 500, &config), 250);
/// ```
pub fn target_position(percent: u8, max_position: i16, config: &ValveConfig) -> i16 {
    let hysteresis = i32::from(config.hysteresis);
    let protection = i32::from(config.protection);
    let max = i32::from(max_position);

    let target = match percent {
        0 => protection - hysteresis,
        p if p >= 100 => max + hysteresis - protection,
        p => i32::from(p) * ((max - 2 * protection) >> 2) / 25 + protection,
    };
    target.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Main valve controller.
///
/// Owns the hardware, the configuration store and all motor state of one
/// valve.
///
/// # Type Parameters
///
/// - `H`: The hardware implementation ([`ValveHardware`] trait)
/// - `S`: The configuration store ([`ConfigStore`] trait)
///
/// # Thread Safety
///
/// The controller itself is not thread-safe. When the interrupt producers run
/// on a different thread than the task loop (e.g., a timer service callback),
/// wrap it in `Arc<Mutex<ValveController>>`.
pub struct ValveController<H: ValveHardware, S: ConfigStore> {
    hw: H,
    store: S,
    pulses: PulseMonitor,
    max_position: i16,
    calibration: CalibrationStep,
    calibration_wait: u8,
    errors: ErrorFlags,
}

impl<H: ValveHardware, S: ConfigStore> ValveController<H, S> {
    /// Create an uncalibrated controller.
    ///
    /// The calibration wait counter starts at
    /// [`ValveConfig::calibration_wait`].
    pub fn new(hw: H, store: S) -> Self {
        let calibration_wait = store.config().calibration_wait;
        Self {
            hw,
            store,
            pulses: PulseMonitor::new(),
            max_position: 0,
            calibration: CalibrationStep::Uninitialized,
            calibration_wait,
            errors: ErrorFlags::empty(),
        }
    }

    // ========================================================================
    // Motor driver
    // ========================================================================

    /// Drive the motor.
    ///
    /// `Stop` always switches off the tick, the photo-eye, the H-bridge and
    /// PWM. Engaging a direction that is already active does nothing;
    /// any other direction re-arms the pulse timeout and noise window.
    pub fn control(&mut self, direction: Direction) -> Result<(), ValveError<H::Error>> {
        match direction {
            Direction::Stop => {
                self.hw.set_tick_enabled(false)?;
                self.hw.set_eye_enabled(false)?;
                self.hw.set_bridge(Direction::Stop)?;
                self.hw.set_pwm(None)?;
                if self.pulses.direction().is_moving() {
                    debug!(position = self.pulses.position(), "motor stopped");
                }
                self.pulses.disarm();
            }
            dir if dir == self.pulses.direction() => {}
            dir => {
                let config = self.store.config();
                let reload = config.pulse_timeout_ticks();
                let speed = match dir {
                    Direction::Open => config.speed_open,
                    _ => config.speed_close,
                };

                self.pulses.arm(dir, reload);
                self.hw.set_eye_enabled(true)?;
                self.hw.set_tick_enabled(true)?;
                self.hw.set_bridge(dir)?;
                self.hw.set_pwm(Some(speed))?;
                debug!(
                    direction = dir.as_str(),
                    speed,
                    position = self.pulses.position(),
                    stop_position = self.pulses.stop_position(),
                    "motor engaged"
                );
            }
        }
        Ok(())
    }

    // ========================================================================
    // Interrupt producers
    // ========================================================================

    /// Photo-eye pin change with the sampled level.
    ///
    /// Returns true if a pulse was counted.
    #[inline]
    pub fn on_eye_sample(&mut self, level: bool) -> bool {
        self.pulses.on_eye_sample(level)
    }

    /// Periodic timer tick.
    ///
    /// On timeout the motor power is cut right away; the rest of the stop is
    /// left to [`on_stop_event`](Self::on_stop_event).
    pub fn on_timer_tick(&mut self) -> Result<TickOutcome, ValveError<H::Error>> {
        let outcome = self.pulses.on_tick();
        if outcome == TickOutcome::Expired {
            self.hw.fast_stop()?;
        }
        Ok(outcome)
    }

    // ========================================================================
    // Deferred handlers
    // ========================================================================

    /// Read and clear the pending task flags.
    #[inline]
    pub fn take_tasks(&mut self) -> TaskFlags {
        self.pulses.take_tasks()
    }

    /// Run the handlers for `flags`: pulse first, then stop.
    pub fn run_tasks(&mut self, flags: TaskFlags) -> Result<(), ValveError<H::Error>> {
        if flags.contains(TaskFlags::PULSE) {
            self.on_pulse_event();
        }
        if flags.contains(TaskFlags::STOP) {
            self.on_stop_event()?;
        }
        Ok(())
    }

    /// Take the pending task flags and run their handlers.
    ///
    /// Returns the flags that were handled.
    pub fn run_pending(&mut self) -> Result<TaskFlags, ValveError<H::Error>> {
        let flags = self.take_tasks();
        if !flags.is_empty() {
            self.run_tasks(flags)?;
        }
        Ok(flags)
    }

    /// Deferred pulse handler. Only reports diagnostics.
    pub fn on_pulse_event(&mut self) {
        trace!(
            direction = self.pulses.direction().as_str(),
            position = self.pulses.position(),
            diagnostic = ?self.pulses.diagnostic(),
            "pulse"
        );
    }

    /// Deferred stop handler.
    ///
    /// Stops the motor and interprets why it stopped: the target count was
    /// reached, or the motor stalled against an end-stop. End-stops update
    /// the position bookkeeping and advance a running calibration.
    pub fn on_stop_event(&mut self) -> Result<(), ValveError<H::Error>> {
        let last_direction = self.pulses.direction();
        self.control(Direction::Stop)?;

        if self.pulses.eye_state() == EyeState::AwaitingStop {
            // A calibration leg targets more than any real travel, so
            // counting up to it means no end-stop was sensed
            if !self.calibration.is_done() {
                warn!(
                    step = self.calibration.as_i8(),
                    position = self.pulses.position(),
                    "calibration failed: end-stop not detected"
                );
                self.calibration = CalibrationStep::Error;
            }
        } else {
            match last_direction {
                Direction::Open => self.reached_open_end()?,
                Direction::Close => self.reached_closed_end()?,
                Direction::Stop => {}
            }
        }

        self.check_range();
        Ok(())
    }

    fn reached_open_end(&mut self) -> Result<(), ValveError<H::Error>> {
        let position = self.pulses.position();
        match self.store.config().manual_calibration {
            ManualCalibration::Fixed(travel) => {
                self.max_position = travel;
                self.pulses.set_position(travel);
            }
            manual => {
                self.max_position = position;
                if manual == ManualCalibration::Auto && position >= MIN_TRAVEL_PULSES {
                    self.store_manual_calibration(ManualCalibration::Fixed(position), true);
                }
            }
        }
        debug!(position, max_position = self.max_position, "open end-stop");

        match self.calibration {
            CalibrationStep::FirstLeg => {
                self.pulses
                    .set_stop_position(position.wrapping_sub(MAX_TRAVEL_PULSES));
                self.control(Direction::Close)?;
                self.calibration = CalibrationStep::FinalLeg;
            }
            CalibrationStep::FinalLeg => self.finish_calibration(),
            _ => {}
        }
        Ok(())
    }

    fn reached_closed_end(&mut self) -> Result<(), ValveError<H::Error>> {
        let position = self.pulses.position();
        if self.store.config().manual_calibration == ManualCalibration::Unset {
            self.max_position = self.max_position.wrapping_sub(position);
        }
        self.pulses.set_position(0);
        debug!(position, max_position = self.max_position, "closed end-stop");

        match self.calibration {
            CalibrationStep::FirstLeg => {
                self.pulses
                    .set_stop_position(position.wrapping_add(MAX_TRAVEL_PULSES));
                self.control(Direction::Open)?;
                self.calibration = CalibrationStep::FinalLeg;
            }
            CalibrationStep::FinalLeg => self.finish_calibration(),
            _ => {}
        }
        Ok(())
    }

    fn finish_calibration(&mut self) {
        self.calibration = CalibrationStep::Done;
        info!(
            max_position = self.max_position,
            position = self.pulses.position(),
            "calibration done"
        );
    }

    fn check_range(&mut self) {
        let fault = self.calibration.is_done()
            && (self.pulses.position() > MAX_TRAVEL_PULSES + 1
                || self.max_position < MIN_TRAVEL_PULSES);

        if fault && !self.errors.contains(ErrorFlags::MOTOR) {
            warn!(
                position = self.pulses.position(),
                max_position = self.max_position,
                "valve travel out of range"
            );
        }
        self.errors.set(ErrorFlags::MOTOR, fault);
    }

    fn store_manual_calibration(&mut self, manual: ManualCalibration, persist: bool) {
        self.store.config_mut().manual_calibration = manual;
        info!(value = manual.to_raw(), persist, "manual calibration updated");
        if !persist {
            return;
        }
        for field in [
            ConfigField::ManualCalibrationLow,
            ConfigField::ManualCalibrationHigh,
        ] {
            if let Err(err) = self.store.persist(field) {
                warn!(?field, ?err, "failed to persist manual calibration");
            }
        }
    }

    // ========================================================================
    // Public control API
    // ========================================================================

    /// Advance or reset calibration.
    ///
    /// `percent` is the last known valve position and picks the direction of
    /// the first leg of a two-leg calibration.
    pub fn update_calibration(
        &mut self,
        request: CalibrationRequest,
        percent: u8,
    ) -> Result<(), ValveError<H::Error>> {
        if request == CalibrationRequest::Unmounted {
            self.control(Direction::Stop)?;
            self.pulses.set_position(0);
            self.pulses.clear_tasks();
            self.max_position = 0;
            self.calibration = CalibrationStep::Uninitialized;
            self.calibration_wait = self.store.config().calibration_wait;
            info!("valve unmounted");
            return Ok(());
        }

        if self.calibration_wait > 0 {
            self.calibration_wait -= 1;
        } else if let CalibrationStep::Pending(_) = self.calibration {
            self.calibration = self.calibration.launched();
            let (direction, stop) = first_leg(self.store.config().manual_calibration, percent);
            info!(
                step = self.calibration.as_i8(),
                direction = direction.as_str(),
                "calibration started"
            );
            self.pulses.set_stop_position(stop);
            self.control(direction)?;
        }

        if self.calibration == CalibrationStep::Uninitialized {
            match request {
                CalibrationRequest::SwitchToManual => {
                    self.store_manual_calibration(ManualCalibration::Unset, true);
                }
                CalibrationRequest::SwitchToAuto => {
                    self.store_manual_calibration(ManualCalibration::Auto, false);
                }
                _ => {}
            }
            self.calibration = CalibrationStep::pending_for(self.store.config().manual_calibration);
            debug!(step = self.calibration.as_i8(), "calibration pending");
        }
        Ok(())
    }

    /// Current position in percent, or [`POSITION_UNKNOWN`].
    pub fn position_percent(&self) -> u8 {
        if !self.calibration.is_done() || self.max_position <= 10 {
            return POSITION_UNKNOWN;
        }
        let percent =
            i32::from(self.pulses.position()) * 10 / (i32::from(self.max_position) / 10);
        percent.clamp(0, 100) as u8
    }

    /// Returns true once a travel range has been established.
    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.max_position != 0 && self.calibration.is_done()
    }

    /// Move the valve to `percent` (0-100).
    ///
    /// A stopped motor is started towards the new target. A running motor
    /// keeps its direction and picks up the new stop position on the next
    /// pulse.
    pub fn goto(&mut self, percent: u8) -> Result<(), ValveError<H::Error>> {
        if !self.calibration.is_done() {
            return Err(ValveError::NotCalibrated);
        }
        if percent > 100 {
            return Err(ValveError::InvalidPercent(percent));
        }

        let stop = target_position(percent, self.max_position, self.store.config());
        self.pulses.set_stop_position(stop);
        debug!(percent, stop_position = stop, "goto");

        if self.pulses.direction() == Direction::Stop {
            let position = self.pulses.position();
            if position > stop {
                self.control(Direction::Close)?;
            } else if position < stop {
                self.control(Direction::Open)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get a reference to the hardware
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Get a reference to the configuration store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the current configuration
    pub fn config(&self) -> &ValveConfig {
        self.store.config()
    }

    /// Tracked position in pulses
    pub fn position(&self) -> i16 {
        self.pulses.position()
    }

    /// Calibrated travel in pulses, 0 when unknown
    pub fn max_position(&self) -> i16 {
        self.max_position
    }

    /// Pulse count the motor stops at
    pub fn stop_position(&self) -> i16 {
        self.pulses.stop_position()
    }

    /// Current motor direction
    pub fn direction(&self) -> Direction {
        self.pulses.direction()
    }

    /// Calibration progress
    pub fn calibration_step(&self) -> CalibrationStep {
        self.calibration
    }

    /// Error register
    pub fn errors(&self) -> ErrorFlags {
        self.errors
    }

    /// Interrupt-side pulse and timer state
    pub fn pulse_monitor(&self) -> &PulseMonitor {
        &self.pulses
    }

    /// Get the current state for UI/API
    pub fn state(&self) -> ValveState {
        let percent = self.position_percent();
        ValveState {
            position: self.pulses.position(),
            max_position: self.max_position,
            stop_position: self.pulses.stop_position(),
            percent: (percent != POSITION_UNKNOWN).then_some(percent),
            direction: self.pulses.direction(),
            calibration: self.calibration,
            errors: self.errors,
            diagnostic: self.pulses.diagnostic(),
            mean_interval: self.pulses.mean_interval(),
        }
    }
}

/// Full state snapshot for UI/API.
///
/// Implements `serde::Serialize` when the `serde` feature is enabled.
///
/// # Example
///
/// ```rust
/// use rs_valve::{hal::{MockConfigStore, MockValve}, CalibrationStep, Direction, ValveController};
///
/// let controller = ValveController::new(MockValve::new(), MockConfigStore::default());
///
/// let state = controller.state();
/// assert_eq!(state.direction, Direction::Stop);
/// assert_eq!(state.calibration, CalibrationStep::Uninitialized);
/// assert!(state.percent.is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValveState {
    /// Tracked position in pulses.
    pub position: i16,
    /// Calibrated travel in pulses, 0 when unknown.
    pub max_position: i16,
    /// Pulse count the motor stops at.
    pub stop_position: i16,
    /// Position in percent, if calibrated.
    pub percent: Option<u8>,
    /// Current motor direction.
    pub direction: Direction,
    /// Calibration progress.
    pub calibration: CalibrationStep,
    /// Error register.
    pub errors: ErrorFlags,
    /// Latest pulse or timeout diagnostic.
    pub diagnostic: PulseDiagnostic,
    /// Average inter-pulse interval in ticks.
    pub mean_interval: Option<u16>,
}
