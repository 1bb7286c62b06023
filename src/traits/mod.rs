//! Trait definitions for hardware abstraction and configuration storage.
//!
//! This module defines the seams that allow rs-valve to:
//! - Run on different hardware (ESP32, desktop mock)
//! - Persist configuration wherever the host system keeps it
//!
//! # Submodules
//!
//! - `hardware`: H-bridge, PWM, photo-eye and tick timer control
//! - `store`: configuration storage
//!
//! # Key Traits
//!
//! - [`ValveHardware`]: Motor and feedback sensor primitives
//! - [`ConfigStore`]: Configuration read access and per-byte persistence

pub mod hardware;
pub mod store;

pub use hardware::*;
pub use store::*;
