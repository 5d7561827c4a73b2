//! TOML loading for per-device feature toggles (spec §1.3/§6.5
//! `features.auto_reconnect`/`features.device_discovery`), the teacher's
//! raw-then-validated two-struct pattern from
//! `services/forwarder/src/config.rs`.

use serde::Deserialize;

use crate::error::DeviceError;

#[derive(Debug, Clone, Copy)]
pub struct DeviceFeatureConfig {
    pub auto_reconnect: bool,
    pub device_discovery: bool,
}

impl Default for DeviceFeatureConfig {
    fn default() -> Self {
        DeviceFeatureConfig {
            auto_reconnect: true,
            device_discovery: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawFeatures {
    auto_reconnect: Option<bool>,
    device_discovery: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawDeviceConfig {
    features: Option<RawFeatures>,
}

pub fn load_device_feature_config(toml_str: &str) -> Result<DeviceFeatureConfig, DeviceError> {
    let raw: RawDeviceConfig = toml::from_str(toml_str).map_err(|e| DeviceError::Config(e.to_string()))?;
    let features = raw.features.unwrap_or_default();
    let defaults = DeviceFeatureConfig::default();
    Ok(DeviceFeatureConfig {
        auto_reconnect: features.auto_reconnect.unwrap_or(defaults.auto_reconnect),
        device_discovery: features.device_discovery.unwrap_or(defaults.device_discovery),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = load_device_feature_config("").unwrap();
        assert!(config.auto_reconnect);
        assert!(!config.device_discovery);
    }

    #[test]
    fn toml_overrides_features() {
        let config = load_device_feature_config("[features]\ndevice_discovery = true\n").unwrap();
        assert!(config.device_discovery);
    }
}
