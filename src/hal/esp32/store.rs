//! Valve configuration persisted in the ESP-IDF NVS.
//!
//! Each configuration byte is stored as its own `u8` entry keyed by field
//! offset, so persisting the manual calibration only rewrites two entries.

use crate::config::{ConfigField, ValveConfig, CONFIG_IMAGE_LEN};
use crate::traits::ConfigStore;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::EspError;

/// NVS namespace holding the valve configuration.
pub const NVS_NAMESPACE: &str = "valve";

/// Entry key for every field, indexed by offset.
const KEYS: [&str; CONFIG_IMAGE_LEN] = ["cfg0", "cfg1", "cfg2", "cfg3", "cfg4", "cfg5", "cfg6", "cfg7"];

/// [`ConfigStore`] backed by the default NVS partition.
///
/// # Example
///
/// ```ignore
/// use esp_idf_svc::nvs::EspDefaultNvsPartition;
/// use rs_valve::hal::esp32::NvsConfigStore;
///
/// let nvs = EspDefaultNvsPartition::take()?;
/// let store = NvsConfigStore::load(nvs)?;
/// println!("manual calibration: {:?}", store.config().manual_calibration);
/// ```
pub struct NvsConfigStore {
    nvs: EspNvs<NvsDefault>,
    config: ValveConfig,
}

impl NvsConfigStore {
    /// Open the namespace and load the stored configuration.
    ///
    /// Entries that were never written keep their default value.
    pub fn load(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;

        let mut image = ValveConfig::default().to_bytes();
        for field in ConfigField::ALL {
            if let Some(value) = nvs.get_u8(KEYS[field.offset()])? {
                image[field.offset()] = value;
            }
        }

        Ok(Self {
            nvs,
            config: ValveConfig::from_bytes(&image),
        })
    }

}

impl ConfigStore for NvsConfigStore {
    type Error = EspError;

    fn config(&self) -> &ValveConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ValveConfig {
        &mut self.config
    }

    fn persist(&mut self, field: ConfigField) -> Result<(), EspError> {
        self.nvs
            .set_u8(KEYS[field.offset()], self.config.field_byte(field))
    }
}
