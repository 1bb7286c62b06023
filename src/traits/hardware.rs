//! Hardware abstraction traits for the valve motor and its feedback sensor.
//!
//! This module defines the hardware capability that lets rs-valve run on
//! different platforms (ESP32, desktop mocks, etc.). The controller core only
//! ever talks to the valve through [`ValveHardware`].
//!
//! # Key Types
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`Direction`] | Commanded motor direction and pulse sign |
//! | [`ValveHardware`] | H-bridge, PWM, photo-eye and tick timer primitives |
//!
//! # Implementation
//!
//! For testing and desktop development, use [`crate::hal::MockValve`]. For
//! ESP32 hardware, use the implementation from `hal::esp32` (requires the
//! `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use rs_valve::traits::{Direction, ValveHardware};
//! use rs_valve::hal::MockValve;
//!
//! let mut hw = MockValve::new();
//! hw.set_bridge(Direction::Open).unwrap();
//! hw.set_pwm(Some(200)).unwrap();
//!
//! hw.fast_stop().unwrap();
//! assert_eq!(hw.bridge, Direction::Stop);
//! assert_eq!(hw.pwm, None);
//! ```

/// Direction the valve motor is driven in.
///
/// Besides selecting the H-bridge polarity, the direction is the sign applied
/// to every counted feedback pulse (see [`step`](Self::step)).
///
/// # Default
///
/// Defaults to [`Stop`](Self::Stop) for safety.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Motor off, H-bridge released.
    #[default]
    Stop,
    /// Driving towards the fully open end-stop (position increases).
    Open,
    /// Driving towards the fully closed end-stop (position decreases).
    Close,
}

impl Direction {
    /// Returns the position increment for one pulse in this direction.
    ///
    /// ```
    /// use rs_valve::Direction;
    ///
    /// assert_eq!(Direction::Open.step(), 1);
    /// assert_eq!(Direction::Close.step(), -1);
    /// assert_eq!(Direction::Stop.step(), 0);
    /// ```
    #[inline]
    pub const fn step(self) -> i16 {
        match self {
            Direction::Stop => 0,
            Direction::Open => 1,
            Direction::Close => -1,
        }
    }

    /// Returns true if the motor is being driven.
    #[inline]
    pub const fn is_moving(self) -> bool {
        !matches!(self, Direction::Stop)
    }

    /// Returns the direction as a lowercase string.
    ///
    /// ```
    /// use rs_valve::Direction;
    ///
    /// assert_eq!(Direction::Open.as_str(), "open");
    /// assert_eq!(Direction::Close.as_str(), "close");
    /// assert_eq!(Direction::Stop.as_str(), "stop");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Stop => "stop",
            Direction::Open => "open",
            Direction::Close => "close",
        }
    }
}

/// Hardware capability driven by the valve controller.
///
/// The four primitives map one-to-one onto the peripherals of a typical
/// radiator valve actuator: an H-bridge for motor polarity, a PWM channel
/// for motor speed, the photo-eye (LED power plus pin-change interrupt) and
/// the periodic timer that drives
/// [`ValveController::on_timer_tick`](crate::ValveController::on_timer_tick).
///
/// # Implementation Notes
///
/// - `set_bridge(Direction::Stop)` must release both half-bridges.
/// - `set_pwm(None)` disconnects the PWM output entirely.
/// - While the eye is disabled no samples may be delivered to the controller.
/// - While the tick is disabled `on_timer_tick` must not be called.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_valve::traits::{Direction, ValveHardware};
///
/// struct MyValve { /* hardware handles */ }
///
/// impl ValveHardware for MyValve {
///     type Error = ();
///
///     fn set_bridge(&mut self, dir: Direction) -> Result<(), ()> {
///         // Set H-bridge pins...
///         Ok(())
///     }
///
///     fn set_pwm(&mut self, duty: Option<u8>) -> Result<(), ()> {
///         // Write the compare register or disconnect the output...
///         Ok(())
///     }
///
///     fn set_eye_enabled(&mut self, enabled: bool) -> Result<(), ()> {
///         // Power the photo-eye LED, unmask the pin-change interrupt...
///         Ok(())
///     }
///
///     fn set_tick_enabled(&mut self, enabled: bool) -> Result<(), ()> {
///         // Start or stop the periodic timer...
///         Ok(())
///     }
/// }
/// ```
pub trait ValveHardware {
    /// Error type for hardware operations.
    type Error;

    /// Drive the H-bridge in the given direction.
    fn set_bridge(&mut self, dir: Direction) -> Result<(), Self::Error>;

    /// Set the PWM duty cycle (0-255), or `None` to switch PWM off.
    fn set_pwm(&mut self, duty: Option<u8>) -> Result<(), Self::Error>;

    /// Power the photo-eye and arm its edge interrupt, or disarm both.
    fn set_eye_enabled(&mut self, enabled: bool) -> Result<(), Self::Error>;

    /// Start or stop the periodic timing tick.
    fn set_tick_enabled(&mut self, enabled: bool) -> Result<(), Self::Error>;

    /// Immediately cut motor power without touching the sensor or timer.
    ///
    /// Used from interrupt context when a timeout expires; the full quiesce
    /// happens later in the deferred stop handler.
    fn fast_stop(&mut self) -> Result<(), Self::Error> {
        self.set_bridge(Direction::Stop)?;
        self.set_pwm(None)
    }
}
