//! Valve motor configuration and its persisted byte layout.
//!
//! The controller reads every tunable (PWM speeds, timeouts, end-stop
//! margins) from a [`ValveConfig`] owned by the [`ConfigStore`]. Individual
//! fields are persisted by byte offset so a store backed by EEPROM or NVS
//! only rewrites what changed.
//!
//! # Example
//!
//! ```rust
//! use rs_valve::config::{ManualCalibration, ValveConfig};
//!
//! // Use defaults
//! let config = ValveConfig::default();
//! assert_eq!(config.manual_calibration, ManualCalibration::Unset);
//!
//! // Or customize
//! let config = ValveConfig::default()
//!     .with_speeds(230, 250)
//!     .with_margins(20, 10)
//!     .with_manual_calibration(ManualCalibration::Fixed(420));
//! assert_eq!(config.speed_open, 230);
//! ```
//!
//! [`ConfigStore`]: crate::traits::ConfigStore

/// Number of bytes in the persisted configuration image.
pub const CONFIG_IMAGE_LEN: usize = 8;

// ============================================================================
// Manual calibration mode
// ============================================================================

/// How the fully-open position is established.
///
/// Persisted as a signed 16-bit value: `-1` for [`Unset`](Self::Unset), `0`
/// for [`Auto`](Self::Auto) and the pulse count itself for
/// [`Fixed`](Self::Fixed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ManualCalibration {
    /// Nothing configured. Every calibration measures both end-stops and
    /// the travel is re-measured whenever the valve closes fully.
    #[default]
    Unset,
    /// Measure the travel once at the open end-stop and store it as
    /// [`Fixed`](Self::Fixed).
    Auto,
    /// Fixed travel in pulses, always greater than zero.
    Fixed(i16),
}

impl ManualCalibration {
    /// Decode the persisted signed value. Any negative value means unset.
    pub const fn from_raw(raw: i16) -> Self {
        if raw < 0 {
            ManualCalibration::Unset
        } else if raw == 0 {
            ManualCalibration::Auto
        } else {
            ManualCalibration::Fixed(raw)
        }
    }

    /// Encode as the persisted signed value.
    pub const fn to_raw(self) -> i16 {
        match self {
            ManualCalibration::Unset => -1,
            ManualCalibration::Auto => 0,
            ManualCalibration::Fixed(pulses) => pulses,
        }
    }

    /// Returns the fixed travel, if one is configured.
    pub const fn fixed(self) -> Option<i16> {
        match self {
            ManualCalibration::Fixed(pulses) => Some(pulses),
            _ => None,
        }
    }
}

// ============================================================================
// Persisted fields
// ============================================================================

/// A single persisted configuration byte, identified by its offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ConfigField {
    /// Per-pulse run timeout, in units of 256 ticks.
    RunTimeout = 0,
    /// PWM duty while opening.
    SpeedOpen = 1,
    /// PWM duty while closing.
    SpeedClose = 2,
    /// End-stop overshoot margin.
    Hysteresis = 3,
    /// End-stop protection margin.
    Protection = 4,
    /// Low byte of the manual calibration value.
    ManualCalibrationLow = 5,
    /// High byte of the manual calibration value.
    ManualCalibrationHigh = 6,
    /// Calibration requests to wait before the first leg starts.
    CalibrationWait = 7,
}

impl ConfigField {
    /// Every field, ordered by offset.
    pub const ALL: [ConfigField; CONFIG_IMAGE_LEN] = [
        ConfigField::RunTimeout,
        ConfigField::SpeedOpen,
        ConfigField::SpeedClose,
        ConfigField::Hysteresis,
        ConfigField::Protection,
        ConfigField::ManualCalibrationLow,
        ConfigField::ManualCalibrationHigh,
        ConfigField::CalibrationWait,
    ];

    /// Byte offset of this field in the configuration image.
    #[inline]
    pub const fn offset(self) -> usize {
        self as usize
    }

}

// ============================================================================
// Valve Config
// ============================================================================

/// Valve motor configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValveConfig {
    /// Per-pulse timeout in units of 256 timer ticks
    pub run_timeout: u8,
    /// PWM duty used while opening (0-255)
    pub speed_open: u8,
    /// PWM duty used while closing (0-255)
    pub speed_close: u8,
    /// Pulses to overshoot past the protection margin at 0% and 100%
    pub hysteresis: u8,
    /// Pulses kept clear of each end-stop for intermediate positions
    pub protection: u8,
    /// Calibration mode / fixed travel
    pub manual_calibration: ManualCalibration,
    /// Calibration requests ignored before a pending calibration starts
    pub calibration_wait: u8,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self {
            run_timeout: 2,
            speed_open: 246,
            speed_close: 246,
            hysteresis: 20,
            protection: 10,
            manual_calibration: ManualCalibration::Unset,
            calibration_wait: 5,
        }
    }
}

impl ValveConfig {
    /// Set the per-pulse run timeout
    pub fn with_run_timeout(mut self, run_timeout: u8) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Set the open and close PWM duty
    pub fn with_speeds(mut self, open: u8, close: u8) -> Self {
        self.speed_open = open;
        self.speed_close = close;
        self
    }

    /// Set the hysteresis and protection margins
    pub fn with_margins(mut self, hysteresis: u8, protection: u8) -> Self {
        self.hysteresis = hysteresis;
        self.protection = protection;
        self
    }

    /// Set the calibration mode
    pub fn with_manual_calibration(mut self, manual: ManualCalibration) -> Self {
        self.manual_calibration = manual;
        self
    }

    /// Set the calibration wait
    pub fn with_calibration_wait(mut self, wait: u8) -> Self {
        self.calibration_wait = wait;
        self
    }

    /// Per-pulse timeout in timer ticks.
    #[inline]
    pub fn pulse_timeout_ticks(&self) -> u16 {
        u16::from(self.run_timeout) << 8
    }

    /// Returns the persisted byte for `field`.
    pub fn field_byte(&self, field: ConfigField) -> u8 {
        let [low, high] = self.manual_calibration.to_raw().to_le_bytes();
        match field {
            ConfigField::RunTimeout => self.run_timeout,
            ConfigField::SpeedOpen => self.speed_open,
            ConfigField::SpeedClose => self.speed_close,
            ConfigField::Hysteresis => self.hysteresis,
            ConfigField::Protection => self.protection,
            ConfigField::ManualCalibrationLow => low,
            ConfigField::ManualCalibrationHigh => high,
            ConfigField::CalibrationWait => self.calibration_wait,
        }
    }

    /// Overwrites one persisted byte.
    ///
    /// The two calibration bytes are decoded together, so restoring them one
    /// at a time passes through an intermediate value. Use
    /// [`from_bytes`](Self::from_bytes) to reload a whole image.
    pub fn set_field_byte(&mut self, field: ConfigField, value: u8) {
        let [low, high] = self.manual_calibration.to_raw().to_le_bytes();
        match field {
            ConfigField::RunTimeout => self.run_timeout = value,
            ConfigField::SpeedOpen => self.speed_open = value,
            ConfigField::SpeedClose => self.speed_close = value,
            ConfigField::Hysteresis => self.hysteresis = value,
            ConfigField::Protection => self.protection = value,
            ConfigField::ManualCalibrationLow => {
                self.manual_calibration =
                    ManualCalibration::from_raw(i16::from_le_bytes([value, high]));
            }
            ConfigField::ManualCalibrationHigh => {
                self.manual_calibration =
                    ManualCalibration::from_raw(i16::from_le_bytes([low, value]));
            }
            ConfigField::CalibrationWait => self.calibration_wait = value,
        }
    }

    /// Serialize into the persisted image.
    pub fn to_bytes(&self) -> [u8; CONFIG_IMAGE_LEN] {
        let mut image = [0u8; CONFIG_IMAGE_LEN];
        for field in ConfigField::ALL {
            image[field.offset()] = self.field_byte(field);
        }
        image
    }

    /// Rebuild from a persisted image.
    pub fn from_bytes(image: &[u8; CONFIG_IMAGE_LEN]) -> Self {
        let byte = |field: ConfigField| image[field.offset()];
        Self {
            run_timeout: byte(ConfigField::RunTimeout),
            speed_open: byte(ConfigField::SpeedOpen),
            speed_close: byte(ConfigField::SpeedClose),
            hysteresis: byte(ConfigField::Hysteresis),
            protection: byte(ConfigField::Protection),
            manual_calibration: ManualCalibration::from_raw(i16::from_le_bytes([
                byte(ConfigField::ManualCalibrationLow),
                byte(ConfigField::ManualCalibrationHigh),
            ])),
            calibration_wait: byte(ConfigField::CalibrationWait),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ValveConfig::default();
        assert_eq!(config.run_timeout, 2);
        assert_eq!(config.speed_open, 246);
        assert_eq!(config.speed_close, 246);
        assert_eq!(config.hysteresis, 20);
        assert_eq!(config.protection, 10);
        assert_eq!(config.manual_calibration, ManualCalibration::Unset);
        assert_eq!(config.calibration_wait, 5);
    }

    #[test]
    fn builder_pattern() {
        let config = ValveConfig::default()
            .with_run_timeout(4)
            .with_speeds(200, 210)
            .with_margins(30, 15)
            .with_manual_calibration(ManualCalibration::Auto)
            .with_calibration_wait(2);

        assert_eq!(config.run_timeout, 4);
        assert_eq!(config.speed_open, 200);
        assert_eq!(config.speed_close, 210);
        assert_eq!(config.hysteresis, 30);
        assert_eq!(config.protection, 15);
        assert_eq!(config.manual_calibration, ManualCalibration::Auto);
        assert_eq!(config.calibration_wait, 2);
    }

    #[test]
    fn pulse_timeout_is_run_timeout_times_256() {
        assert_eq!(ValveConfig::default().pulse_timeout_ticks(), 512);
        let config = ValveConfig::default().with_run_timeout(255);
        assert_eq!(config.pulse_timeout_ticks(), 0xff00);
    }

    // =========================================================================
    // ManualCalibration Tests
    // =========================================================================

    #[test]
    fn manual_calibration_raw_values() {
        assert_eq!(ManualCalibration::Unset.to_raw(), -1);
        assert_eq!(ManualCalibration::Auto.to_raw(), 0);
        assert_eq!(ManualCalibration::Fixed(321).to_raw(), 321);
    }

    #[test]
    fn manual_calibration_from_raw() {
        assert_eq!(ManualCalibration::from_raw(-1), ManualCalibration::Unset);
        assert_eq!(ManualCalibration::from_raw(-300), ManualCalibration::Unset);
        assert_eq!(ManualCalibration::from_raw(0), ManualCalibration::Auto);
        assert_eq!(ManualCalibration::from_raw(1), ManualCalibration::Fixed(1));
    }

    #[test]
    fn manual_calibration_fixed_accessor() {
        assert_eq!(ManualCalibration::Fixed(77).fixed(), Some(77));
        assert_eq!(ManualCalibration::Auto.fixed(), None);
        assert_eq!(ManualCalibration::Unset.fixed(), None);
    }

    // =========================================================================
    // Persisted Layout Tests
    // =========================================================================

    #[test]
    fn field_offsets_are_dense() {
        for (i, field) in ConfigField::ALL.iter().enumerate() {
            assert_eq!(field.offset(), i);
        }
    }

    #[test]
    fn manual_calibration_stored_little_endian() {
        let config =
            ValveConfig::default().with_manual_calibration(ManualCalibration::Fixed(0x0234));
        assert_eq!(config.field_byte(ConfigField::ManualCalibrationLow), 0x34);
        assert_eq!(config.field_byte(ConfigField::ManualCalibrationHigh), 0x02);

        let unset = ValveConfig::default();
        assert_eq!(unset.field_byte(ConfigField::ManualCalibrationLow), 0xff);
        assert_eq!(unset.field_byte(ConfigField::ManualCalibrationHigh), 0xff);
    }

    #[test]
    fn image_restores_config() {
        let config = ValveConfig::default()
            .with_speeds(180, 190)
            .with_manual_calibration(ManualCalibration::Fixed(512));
        let image = config.to_bytes();
        assert_eq!(ValveConfig::from_bytes(&image), config);
    }

    #[test]
    fn erased_image_decodes_as_unset() {
        // Erased EEPROM/flash reads back as 0xff
        let config = ValveConfig::from_bytes(&[0xff; CONFIG_IMAGE_LEN]);
        assert_eq!(config.manual_calibration, ManualCalibration::Unset);
        assert_eq!(config.run_timeout, 0xff);
    }
}
