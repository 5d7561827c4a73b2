//! TOML loading for [`CorrelatorConfig`] (spec §1.3 ambient configuration),
//! the teacher's raw-then-validated two-struct pattern from
//! `services/forwarder/src/config.rs`.

use std::time::Duration;

use serde::Deserialize;

use crate::correlator::CorrelatorConfig;
use crate::error::CorrelatorError;

#[derive(Debug, Deserialize, Default)]
struct RawCorrelatorConfig {
    enable_reconnect: Option<bool>,
    max_reconnect_attempts: Option<u32>,
    reconnect_delay_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
}

pub fn load_correlator_config(toml_str: &str) -> Result<CorrelatorConfig, CorrelatorError> {
    let raw: RawCorrelatorConfig =
        toml::from_str(toml_str).map_err(|e| CorrelatorError::Config(e.to_string()))?;
    let defaults = CorrelatorConfig::default();
    Ok(CorrelatorConfig {
        enable_reconnect: raw.enable_reconnect.unwrap_or(defaults.enable_reconnect),
        max_reconnect_attempts: raw.max_reconnect_attempts.unwrap_or(defaults.max_reconnect_attempts),
        reconnect_delay: raw.reconnect_delay_ms.map(Duration::from_millis).unwrap_or(defaults.reconnect_delay),
        backoff_multiplier: raw.backoff_multiplier.unwrap_or(defaults.backoff_multiplier),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = load_correlator_config("").unwrap();
        assert_eq!(config.max_reconnect_attempts, CorrelatorConfig::default().max_reconnect_attempts);
    }

    #[test]
    fn toml_overrides_individual_fields() {
        let config = load_correlator_config("max_reconnect_attempts = 10\nenable_reconnect = false\n").unwrap();
        assert_eq!(config.max_reconnect_attempts, 10);
        assert!(!config.enable_reconnect);
    }
}
