//! # Sync Configuration
//!
//! Tunables for prediction, smoothing and throttling, loaded once at startup
//! from TOML. Every field has a default so a partial file is fine.
//!
//! ```toml
//! throttle_interval_ms = 100
//! rotation_duration_ms = 120
//! remote_divisor_max = 60.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Client synchronization configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Minimum spacing between outbound `player.move` messages (ms).
    pub throttle_interval_ms: u64,
    /// Decimal places kept when serializing the control vector.
    pub control_precision: u32,
    /// Total duration of one rotation tween (ms).
    pub rotation_duration_ms: f32,
    /// Local player moves 1/divisor of the way to the server position per frame.
    pub local_correction_divisor: f32,
    /// Smallest remote correction divisor (large deviations).
    pub remote_divisor_min: f32,
    /// Largest remote correction divisor (small deviations).
    pub remote_divisor_max: f32,
    /// Deviation scale: divisor = scale / deviation before clamping.
    pub remote_deviation_scale: f32,
    /// Samples with traction below this are discarded.
    pub traction_epsilon: f32,
    /// Sample count at which the running mean is re-weighted.
    pub velocity_sample_cap: u32,
    /// Sample count the mean is re-weighted to.
    pub velocity_sample_floor: u32,
    /// Speed used before the first valid sample.
    pub initial_speed: f32,
    /// Fraction of the half-screen radius that maps to full traction.
    pub pointer_live_area_ratio: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            throttle_interval_ms: 100,
            control_precision: 4,
            rotation_duration_ms: 100.0,
            local_correction_divisor: 50.0,
            remote_divisor_min: 5.0,
            remote_divisor_max: 75.0,
            remote_deviation_scale: 750.0,
            traction_epsilon: 0.01,
            velocity_sample_cap: 300,
            velocity_sample_floor: 10,
            initial_speed: 0.0,
            pointer_live_area_ratio: 0.7,
        }
    }
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or a value is out of range.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or fails validation.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.throttle_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "throttle_interval_ms must be positive".to_string(),
            ));
        }
        if self.control_precision > 8 {
            return Err(ConfigError::Invalid(
                "control_precision must be at most 8".to_string(),
            ));
        }
        if !is_positive(self.rotation_duration_ms) {
            return Err(ConfigError::Invalid(
                "rotation_duration_ms must be positive".to_string(),
            ));
        }
        if !at_least(self.local_correction_divisor, 1.0) {
            return Err(ConfigError::Invalid(
                "local_correction_divisor must be at least 1".to_string(),
            ));
        }
        if !at_least(self.remote_divisor_min, 1.0) || !at_least(self.remote_divisor_max, self.remote_divisor_min) {
            return Err(ConfigError::Invalid(format!(
                "remote divisor range [{}, {}] is invalid",
                self.remote_divisor_min, self.remote_divisor_max
            )));
        }
        if !is_positive(self.remote_deviation_scale) {
            return Err(ConfigError::Invalid(
                "remote_deviation_scale must be positive".to_string(),
            ));
        }
        if !is_positive(self.traction_epsilon) {
            return Err(ConfigError::Invalid(
                "traction_epsilon must be positive".to_string(),
            ));
        }
        if self.velocity_sample_floor == 0 || self.velocity_sample_floor >= self.velocity_sample_cap {
            return Err(ConfigError::Invalid(format!(
                "velocity sample floor {} must be in 1..{}",
                self.velocity_sample_floor, self.velocity_sample_cap
            )));
        }
        if !at_least(self.initial_speed, 0.0) {
            return Err(ConfigError::Invalid(
                "initial_speed must not be negative".to_string(),
            ));
        }
        if !is_positive(self.pointer_live_area_ratio) || !at_least(1.0, self.pointer_live_area_ratio) {
            return Err(ConfigError::Invalid(
                "pointer_live_area_ratio must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Throttle interval as a [`Duration`].
    #[must_use]
    pub const fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }
}

/// False for NaN.
fn is_positive(value: f32) -> bool {
    value > 0.0
}

/// False for NaN.
fn at_least(value: f32, min: f32) -> bool {
    value >= min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SyncConfig::from_toml_str("throttle_interval_ms = 250\n").unwrap();
        assert_eq!(config.throttle_interval_ms, 250);
        assert_eq!(config.local_correction_divisor, 50.0);
        assert_eq!(config.throttle_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_inverted_divisor_range() {
        let err = SyncConfig::from_toml_str("remote_divisor_min = 80.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_key() {
        let err = SyncConfig::from_toml_str("warp_speed = 9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(SyncConfig::from_toml_str("throttle_interval_ms = 0\n").is_err());
    }
}
