//! Persistent configuration storage trait.
//!
//! The controller never loads or saves configuration by itself. It reads the
//! current [`ValveConfig`] from a [`ConfigStore`] and asks the store to
//! persist individual bytes on the two occasions the calibration mode
//! changes: the first successful automatic travel measurement and a forced
//! switch of calibration mode.

use crate::config::{ConfigField, ValveConfig};

/// Configuration storage collaborator.
///
/// # Implementation Notes
///
/// - `config()` must always reflect the latest in-memory values, including
///   changes made through `config_mut()` that have not been persisted yet.
/// - `persist()` writes the current value of a single byte; the byte value
///   is available from [`ValveConfig::field_byte`].
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_valve::config::{ConfigField, ValveConfig};
/// use rs_valve::traits::ConfigStore;
///
/// struct EepromStore { config: ValveConfig, eeprom: MyEeprom }
///
/// impl ConfigStore for EepromStore {
///     type Error = EepromError;
///
///     fn config(&self) -> &ValveConfig {
///         &self.config
///     }
///
///     fn config_mut(&mut self) -> &mut ValveConfig {
///         &mut self.config
///     }
///
///     fn persist(&mut self, field: ConfigField) -> Result<(), EepromError> {
///         self.eeprom.write(field.offset(), self.config.field_byte(field))
///     }
/// }
/// ```
pub trait ConfigStore {
    /// Error type for persistence operations.
    type Error: core::fmt::Debug;

    /// Current configuration.
    fn config(&self) -> &ValveConfig;

    /// Mutable access to the in-memory configuration.
    fn config_mut(&mut self) -> &mut ValveConfig;

    /// Write one byte of the current configuration to persistent storage.
    fn persist(&mut self, field: ConfigField) -> Result<(), Self::Error>;
}
