//! ESP32 hardware abstraction layer for a motorized radiator valve.
//!
//! This module provides hardware implementations for an ESP32 driving a
//! small valve gear motor through an H-bridge, with an IR photo-eye looking
//! at a slotted wheel on the gearbox for position feedback.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 SuperMini (RISC-V 160MHz, 4MB Flash)
//! - **Motor Driver**: DRV8833 style dual half-bridge, one PWM input per side
//! - **Feedback**: IR LED + phototransistor across the gear wheel slots
//! - **Storage**: Valve configuration in the default NVS partition
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments matching the SuperMini layout.

mod store;
mod valve;

pub use store::NvsConfigStore;
pub use valve::Esp32Valve;

/// Pin assignments for SuperMini ESP32-C3.
///
/// - Motor bridge inputs on GPIO2/3
/// - Photo-eye LED power on GPIO4, sensor input on GPIO5
pub mod pins {
    // =========================================================================
    // Motor Bridge
    // =========================================================================

    /// Open-side bridge input (PWM while opening)
    pub const BRIDGE_OPEN: i32 = 2;

    /// Close-side bridge input (PWM while closing)
    pub const BRIDGE_CLOSE: i32 = 3;

    // =========================================================================
    // Photo-eye
    // =========================================================================

    /// IR LED supply, high while the motor runs
    pub const EYE_POWER: i32 = 4;

    /// Phototransistor output, high when a slot passes
    pub const EYE_SENSE: i32 = 5;
}
