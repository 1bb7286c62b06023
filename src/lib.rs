//! # rs-valve
//!
//! Closed-loop position controller for a motorized radiator valve: a PWM
//! driven H-bridge moves the spindle, a photo-eye counts feedback pulses,
//! and a calibration state machine measures the travel between the two
//! end-stops.
//!
//! ## Features
//!
//! - **Hardware abstraction**: Traits for the motor bridge, PWM, photo-eye and tick timer
//! - **Interrupt-safe split**: Producers only count and raise task flags; a task loop finalizes stops
//! - **Stall detection**: Per-pulse timeout stops the motor at an end-stop
//! - **Calibration**: Automatic two-leg measurement, one-shot auto store, or fixed manual travel
//! - **Fault reporting**: Out-of-range travel raises a motor error flag
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and configuration storage abstractions
//! - `config` - Tunables and their persisted byte layout
//! - `pulse` - Pulse counting and timeout monitoring (interrupt side)
//! - `calibration` - Calibration steps and requests
//! - `valve` - Main controller that ties everything together
//! - `hal` - Concrete implementations (mock and simulator for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use rs_valve::{
//!     CalibrationRequest, ValveController,
//!     hal::{MockConfigStore, MockValve, ValveMechanics},
//! };
//!
//! let mut controller = ValveController::new(MockValve::new(), MockConfigStore::default());
//! let mut valve = ValveMechanics::new(300);
//!
//! // Not calibrated yet
//! assert!(controller.goto(50).is_err());
//! assert_eq!(controller.position_percent(), rs_valve::POSITION_UNKNOWN);
//!
//! // Call periodically from the control loop; launches after the wait
//! for _ in 0..6 {
//!     controller.update_calibration(CalibrationRequest::Tick, 0).unwrap();
//! }
//!
//! // Interrupts and task loop, simulated
//! valve.run_until_idle(&mut controller, 1_000_000).unwrap();
//! assert!(controller.is_calibrated());
//!
//! controller.goto(100).unwrap();
//! valve.run_until_idle(&mut controller, 1_000_000).unwrap();
//! assert_eq!(controller.position_percent(), 100);
//! assert!(valve.at_open_end());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Calibration steps, requests and travel limits.
pub mod calibration;
/// Valve configuration and persisted byte layout.
pub mod config;
/// Error types and the fault register.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Photo-eye pulse counting and motor timeout monitoring.
pub mod pulse;
/// Core traits for hardware abstraction and configuration storage.
pub mod traits;
/// Main valve controller that coordinates pulses, calibration and hardware.
pub mod valve;

// Re-exports for convenience
pub use calibration::{
    CalibrationLegs, CalibrationRequest, CalibrationStep, MAX_TRAVEL_PULSES, MIN_TRAVEL_PULSES,
};
pub use config::{ConfigField, ManualCalibration, ValveConfig};
pub use error::{ErrorFlags, ValveError};
pub use pulse::{EyeState, PulseDiagnostic, PulseMonitor, TaskFlags, TickOutcome};
pub use traits::{ConfigStore, Direction, ValveHardware};
pub use valve::{ValveController, ValveState, POSITION_UNKNOWN};
