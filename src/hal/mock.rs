//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the hardware and storage traits,
//! plus a small physical model of a valve so calibration and positioning can
//! be exercised end to end on the desktop.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockValve`] | [`ValveHardware`] | Records bridge, PWM, eye and tick state |
//! | [`MockConfigStore`] | [`ConfigStore`] | In-memory config, records persisted bytes |
//! | [`ValveMechanics`] | - | Simulated actuator producing photo-eye pulses |
//!
//! # Example
//!
//! ```rust
//! use rs_valve::hal::{MockConfigStore, MockValve};
//! use rs_valve::{Direction, ValveController};
//!
//! let mut controller = ValveController::new(MockValve::new(), MockConfigStore::default());
//! controller.control(Direction::Close).unwrap();
//!
//! let hw = controller.hardware();
//! assert_eq!(hw.bridge, Direction::Close);
//! assert_eq!(hw.pwm, Some(246));
//! assert!(hw.eye_enabled);
//! ```
//!
//! [`ValveHardware`]: crate::traits::ValveHardware
//! [`ConfigStore`]: crate::traits::ConfigStore

use alloc::vec::Vec;
use core::convert::Infallible;

use crate::config::{ConfigField, ValveConfig};
use crate::error::ValveError;
use crate::traits::{ConfigStore, Direction, ValveHardware};
use crate::valve::ValveController;

// ============================================================================
// Hardware Mock
// ============================================================================

/// Mock valve hardware for testing.
///
/// Use the public fields to inspect state after test operations.
///
/// # Example
///
/// ```rust
/// use rs_valve::hal::MockValve;
/// use rs_valve::traits::{Direction, ValveHardware};
///
/// let mut hw = MockValve::new();
/// hw.set_bridge(Direction::Open).unwrap();
/// hw.set_pwm(Some(128)).unwrap();
///
/// assert_eq!(hw.bridge, Direction::Open);
/// assert_eq!(hw.pwm, Some(128));
/// assert_eq!(hw.calls, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockValve {
    /// Current H-bridge direction.
    pub bridge: Direction,
    /// Current PWM duty, `None` when switched off.
    pub pwm: Option<u8>,
    /// Photo-eye powered and armed.
    pub eye_enabled: bool,
    /// Periodic tick running.
    pub tick_enabled: bool,
    /// Number of hardware calls made.
    pub calls: usize,
    /// Number of `fast_stop` calls.
    pub fast_stops: usize,
}

impl MockValve {
    /// Creates a new mock with everything switched off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the motor is powered in some direction.
    pub fn is_driving(&self) -> bool {
        self.bridge.is_moving() && self.pwm.is_some_and(|duty| duty > 0)
    }
}

impl ValveHardware for MockValve {
    type Error = Infallible;

    fn set_bridge(&mut self, dir: Direction) -> Result<(), Infallible> {
        self.bridge = dir;
        self.calls += 1;
        Ok(())
    }

    fn set_pwm(&mut self, duty: Option<u8>) -> Result<(), Infallible> {
        self.pwm = duty;
        self.calls += 1;
        Ok(())
    }

    fn set_eye_enabled(&mut self, enabled: bool) -> Result<(), Infallible> {
        self.eye_enabled = enabled;
        self.calls += 1;
        Ok(())
    }

    fn set_tick_enabled(&mut self, enabled: bool) -> Result<(), Infallible> {
        self.tick_enabled = enabled;
        self.calls += 1;
        Ok(())
    }

    fn fast_stop(&mut self) -> Result<(), Infallible> {
        self.bridge = Direction::Stop;
        self.pwm = None;
        self.fast_stops += 1;
        Ok(())
    }
}

// ============================================================================
// Storage Mock
// ============================================================================

/// Error returned by [`MockConfigStore`] when [`fail`](MockConfigStore::fail)
/// is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockStoreError;

/// In-memory configuration store.
///
/// Every successful `persist` call is recorded as `(field, byte)` in
/// [`persisted`](Self::persisted).
///
/// # Example
///
/// ```rust
/// use rs_valve::config::{ConfigField, ValveConfig};
/// use rs_valve::hal::MockConfigStore;
/// use rs_valve::traits::ConfigStore;
///
/// let mut store = MockConfigStore::new(ValveConfig::default().with_speeds(100, 120));
/// store.persist(ConfigField::SpeedClose).unwrap();
/// assert_eq!(store.persisted, vec![(ConfigField::SpeedClose, 120)]);
///
/// store.fail = true;
/// assert!(store.persist(ConfigField::SpeedOpen).is_err());
/// assert_eq!(store.persisted.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockConfigStore {
    /// In-memory configuration.
    pub config: ValveConfig,
    /// Bytes written by `persist`, in call order.
    pub persisted: Vec<(ConfigField, u8)>,
    /// Make every `persist` call fail.
    pub fail: bool,
}

impl MockConfigStore {
    /// Creates a store holding `config`.
    pub fn new(config: ValveConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

impl ConfigStore for MockConfigStore {
    type Error = MockStoreError;

    fn config(&self) -> &ValveConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ValveConfig {
        &mut self.config
    }

    fn persist(&mut self, field: ConfigField) -> Result<(), MockStoreError> {
        if self.fail {
            return Err(MockStoreError);
        }
        self.persisted.push((field, self.config.field_byte(field)));
        Ok(())
    }
}

// ============================================================================
// Valve Simulation
// ============================================================================

/// Default number of timer ticks the simulated motor needs per pulse.
pub const DEFAULT_TICKS_PER_PULSE: u32 = 40;

/// Physical model of a valve actuator with a slotted photo-eye wheel.
///
/// The spindle moves one unit per timer tick while the motor is powered and
/// stops dead at either end-stop. One pulse is `ticks_per_pulse` units long;
/// the photo-eye is lit for the middle half of every pulse, so both
/// end-stops sit in a dark region and every pulse gives exactly one rising
/// edge in either direction.
///
/// # Example
///
/// ```rust
/// use rs_valve::hal::ValveMechanics;
/// use rs_valve::Direction;
///
/// let mut valve = ValveMechanics::new(10);
/// assert!(valve.at_closed_end());
///
/// // Drive open until the end-stop blocks further motion
/// while valve.step(Direction::Open, Some(200)) {}
/// assert!(valve.at_open_end());
/// assert_eq!(valve.pulse_position(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct ValveMechanics {
    travel: i16,
    ticks_per_pulse: u32,
    position: u32,
}

impl ValveMechanics {
    /// Valve with `travel` pulses between its end-stops, starting fully
    /// closed.
    pub fn new(travel: i16) -> Self {
        Self {
            travel: travel.max(0),
            ticks_per_pulse: DEFAULT_TICKS_PER_PULSE,
            position: 0,
        }
    }

    /// Set the motor speed in ticks per pulse (minimum 4).
    pub fn with_ticks_per_pulse(mut self, ticks: u32) -> Self {
        self.ticks_per_pulse = ticks.max(4);
        self
    }

    /// Start at the given pulse position instead of fully closed.
    pub fn with_pulse_position(mut self, pulses: i16) -> Self {
        let pulses = pulses.clamp(0, self.travel);
        self.position = pulses as u32 * self.ticks_per_pulse;
        self
    }

    fn end(&self) -> u32 {
        self.travel as u32 * self.ticks_per_pulse
    }

    /// Travel between the end-stops, in pulses.
    pub fn travel(&self) -> i16 {
        self.travel
    }

    /// Physical position in whole pulses from the closed end-stop.
    pub fn pulse_position(&self) -> i16 {
        (self.position / self.ticks_per_pulse) as i16
    }

    /// Returns true at the closed end-stop.
    pub fn at_closed_end(&self) -> bool {
        self.position == 0
    }

    /// Returns true at the open end-stop.
    pub fn at_open_end(&self) -> bool {
        self.position == self.end()
    }

    /// Current photo-eye level.
    pub fn eye_level(&self) -> bool {
        let phase = self.position % self.ticks_per_pulse;
        let quarter = self.ticks_per_pulse / 4;
        phase >= quarter && phase < self.ticks_per_pulse - quarter
    }

    /// Advance by one tick with the given drive. Returns true if the spindle
    /// moved.
    pub fn step(&mut self, bridge: Direction, pwm: Option<u8>) -> bool {
        if !pwm.is_some_and(|duty| duty > 0) {
            return false;
        }
        match bridge {
            Direction::Open if self.position < self.end() => {
                self.position += 1;
                true
            }
            Direction::Close if self.position > 0 => {
                self.position -= 1;
                true
            }
            _ => false,
        }
    }

    /// Run the controller against this valve until the motor is stopped and
    /// no task is pending.
    ///
    /// Each simulated tick moves the spindle, delivers an eye sample (when
    /// the eye is enabled) and a timer tick (when the tick is enabled), then
    /// runs pending tasks. Returns the number of ticks simulated; stops early
    /// after `max_ticks`.
    pub fn run_until_idle<S: ConfigStore>(
        &mut self,
        controller: &mut ValveController<MockValve, S>,
        max_ticks: u32,
    ) -> Result<u32, ValveError<Infallible>> {
        let mut ticks = 0;
        while ticks < max_ticks {
            if !controller.direction().is_moving()
                && controller.pulse_monitor().pending_tasks().is_empty()
            {
                break;
            }

            let hw = controller.hardware();
            let (bridge, pwm) = (hw.bridge, hw.pwm);
            self.step(bridge, pwm);

            if controller.hardware().eye_enabled {
                controller.on_eye_sample(self.eye_level());
            }
            if controller.hardware().tick_enabled {
                controller.on_timer_tick()?;
            }
            controller.run_pending()?;
            ticks += 1;
        }
        Ok(ticks)
    }
}
