//! Error types and the shared fault register.
//!
//! Failures that the wider control system has to poll for (a failed
//! calibration, an implausible position) are state, not errors: they show up
//! in [`CalibrationStep::Error`](crate::CalibrationStep::Error) and
//! [`ErrorFlags`]. [`ValveError`] only covers calls that are refused or that
//! hit a hardware error.

use bitflags::bitflags;
use thiserror::Error;

/// Errors returned by [`ValveController`](crate::ValveController) operations.
///
/// Generic over the hardware error type `E`, which converts into
/// [`ValveError::Hardware`] so that `?` works on hardware calls.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValveError<E> {
    /// A position was requested before calibration finished.
    #[error("valve is not calibrated")]
    NotCalibrated,

    /// Requested position above 100%.
    #[error("valve position {0}% out of range")]
    InvalidPercent(u8),

    /// The hardware layer reported an error.
    #[error("hardware error: {0:?}")]
    Hardware(E),
}

impl<E> From<E> for ValveError<E> {
    fn from(err: E) -> Self {
        ValveError::Hardware(err)
    }
}

bitflags! {
    /// Error register shared with the wider control system.
    ///
    /// The valve controller owns the [`MOTOR`](Self::MOTOR) bit. Bits outside it
    /// are kept as-is when the register is rebuilt from raw bits.
    ///
    /// ```rust
    /// use rs_valve::ErrorFlags;
    ///
    /// let mut flags = ErrorFlags::empty();
    /// flags.set(ErrorFlags::MOTOR, true);
    /// assert!(flags.contains(ErrorFlags::MOTOR));
    ///
    /// flags.set(ErrorFlags::MOTOR, false);
    /// assert!(flags.is_empty());
    /// ```
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct ErrorFlags: u8 {
        /// Motor position or travel range is implausible.
        const MOTOR = 1 << 2;

        // Bits owned by the host system
        const _ = !0;
    }
}
