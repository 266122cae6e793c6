// Static device settings
// Defaults for every tunable, optionally overridden from a JSON file at boot

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::events::classifier::{ClassifierConfig, DirectionGate};
use crate::events::detector::{DetectorConfig, VelocityModel};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Boot-time configuration for the device loop
///
/// Nothing here is persisted by the device; runtime changes arrive over the
/// config channel and are lost on power cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Name reported in impact records
    pub device_name: String,

    /// Sampling tick (10 ms = 100 Hz)
    pub sample_interval_ms: u64,

    /// Default impact threshold (m/s²) until reconfigured
    pub impact_threshold: f32,

    pub cooldown_ms: u64,

    /// Gravity smoothing factor
    pub gravity_alpha: f32,

    /// Static offset subtracted from motion magnitude
    pub magnitude_offset: f32,

    /// Samples averaged per calibration
    pub calibration_samples: usize,

    /// Magnitude spread above which calibration is flagged as moving
    pub calibration_max_spread: f32,

    /// Boot calibration retries before falling back to standard gravity
    pub calibration_attempts: u32,

    pub heartbeat_interval_ms: u64,

    /// Settle time after a disconnect before advertising again
    pub disconnect_grace_ms: u64,

    pub direction_gate: DirectionGate,

    pub velocity_model: VelocityModel,

    /// Reject config writes containing unknown keys
    pub strict_config: bool,

    /// Consecutive all-zero samples before a sensor bus reset
    pub fault_reset_after: u32,

    /// Retry spacing after a failed sensor reset
    pub fault_retry_ms: u64,

    /// Reported battery voltage on hosts without a gauge
    pub battery_voltage: f32,

    pub classifier: ClassifierConfig,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            device_name: "VODKA-Drumstick".to_string(),
            sample_interval_ms: 10,
            impact_threshold: 15.0,
            cooldown_ms: 50,
            gravity_alpha: 0.98,
            magnitude_offset: 0.0,
            calibration_samples: 100,
            calibration_max_spread: 0.5,
            calibration_attempts: 3,
            heartbeat_interval_ms: 30_000,
            disconnect_grace_ms: 500,
            direction_gate: DirectionGate::DownOnly,
            velocity_model: VelocityModel::FixedInterval,
            strict_config: false,
            fault_reset_after: 3,
            fault_retry_ms: 1000,
            battery_voltage: 3.7,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl DeviceSettings {
    /// Load settings from a JSON file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let data = std::fs::read(path)?;
        let settings = Self::from_json_bytes(&data)?;
        log::info!("Loaded device settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, SettingsError> {
        let settings: DeviceSettings = serde_json::from_slice(data)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.sample_interval_ms == 0 {
            return Err(SettingsError::Invalid(
                "sample_interval_ms must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.gravity_alpha) {
            return Err(SettingsError::Invalid(format!(
                "gravity_alpha must be in [0, 1), got {}",
                self.gravity_alpha
            )));
        }
        if !self.impact_threshold.is_finite() || self.impact_threshold < 0.0 {
            return Err(SettingsError::Invalid(format!(
                "impact_threshold must be a non-negative number, got {}",
                self.impact_threshold
            )));
        }
        if self.calibration_samples == 0 {
            return Err(SettingsError::Invalid(
                "calibration_samples must be positive".to_string(),
            ));
        }
        if !self.calibration_max_spread.is_finite() || self.calibration_max_spread < 0.0 {
            return Err(SettingsError::Invalid(format!(
                "calibration_max_spread must be a non-negative number, got {}",
                self.calibration_max_spread
            )));
        }

        // NaN slips through every comparison downstream
        let finite = [
            ("magnitude_offset", self.magnitude_offset),
            ("battery_voltage", self.battery_voltage),
            ("classifier.vertical_alignment", self.classifier.vertical_alignment),
            ("classifier.lateral_min", self.classifier.lateral_min),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SettingsError::Invalid(format!(
                "{} must be a finite number, got {}",
                name, value
            )));
        }
        if self.device_name.is_empty() {
            return Err(SettingsError::Invalid("device_name is empty".to_string()));
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            threshold: self.impact_threshold,
            cooldown_ms: self.cooldown_ms,
            sample_interval_ms: self.sample_interval_ms,
            magnitude_offset: self.magnitude_offset,
            velocity_model: self.velocity_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = DeviceSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.impact_threshold, 15.0);
        assert_eq!(settings.cooldown_ms, 50);
        assert_eq!(settings.heartbeat_interval_ms, 30_000);
        assert_eq!(settings.direction_gate, DirectionGate::DownOnly);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("device.json");
        fs::write(
            &path,
            r#"{"impact_threshold": 18.5, "direction_gate": "all", "classifier": {"lateral_min": 0.4}}"#,
        )
        .unwrap();

        let settings = DeviceSettings::load(&path).unwrap();
        assert_eq!(settings.impact_threshold, 18.5);
        assert_eq!(settings.direction_gate, DirectionGate::All);
        assert_eq!(settings.classifier.lateral_min, 0.4);
        assert_eq!(settings.classifier.vertical_alignment, 0.7);
        assert_eq!(settings.sample_interval_ms, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            DeviceSettings::from_json_bytes(br#"{"gravity_alpha": 1.0}"#),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(
            DeviceSettings::from_json_bytes(br#"{"sample_interval_ms": 0}"#),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(
            DeviceSettings::from_json_bytes(br#"{"velocity_model": "sideways"}"#),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let cases = [
            DeviceSettings {
                magnitude_offset: f32::NAN,
                ..DeviceSettings::default()
            },
            DeviceSettings {
                calibration_max_spread: f32::INFINITY,
                ..DeviceSettings::default()
            },
            DeviceSettings {
                calibration_max_spread: -0.1,
                ..DeviceSettings::default()
            },
            DeviceSettings {
                battery_voltage: f32::NAN,
                ..DeviceSettings::default()
            },
            DeviceSettings {
                classifier: ClassifierConfig {
                    vertical_alignment: f32::NAN,
                    ..ClassifierConfig::default()
                },
                ..DeviceSettings::default()
            },
            DeviceSettings {
                classifier: ClassifierConfig {
                    lateral_min: f32::NEG_INFINITY,
                    ..ClassifierConfig::default()
                },
                ..DeviceSettings::default()
            },
        ];
        for settings in cases {
            assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
        }
    }

    #[test]
    fn test_detector_config_mapping() {
        let settings = DeviceSettings {
            impact_threshold: 12.0,
            velocity_model: VelocityModel::MeasuredInterval,
            ..DeviceSettings::default()
        };
        let config = settings.detector_config();
        assert_eq!(config.threshold, 12.0);
        assert_eq!(config.velocity_model, VelocityModel::MeasuredInterval);
        assert_eq!(config.sample_interval_ms, 10);
    }
}
