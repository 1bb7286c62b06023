//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations and a valve simulator for desktop development
//! - `esp32`: ESP32 with an H-bridge motor driver and photo-eye (requires `esp32` feature)

#[cfg(any(test, feature = "std"))]
pub mod mock;

#[cfg(feature = "esp32")]
pub mod esp32;

#[cfg(any(test, feature = "std"))]
pub use mock::*;

#[cfg(feature = "esp32")]
pub use esp32::*;
