// Runtime configuration updates
// Parses writes on the config channel into sparse, validated updates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keys understood on the config channel
pub const KNOWN_FIELDS: [&str; 3] = ["impact_threshold", "calibrate", "reset_stats"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Malformed config payload: {0}")]
    Malformed(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Unknown config field: {0}")]
    UnknownField(String),
}

/// Sparse partial update. Absent fields leave device state unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_threshold: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrate: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_stats: Option<bool>,
}

impl ConfigUpdate {
    /// Parse a raw config write.
    ///
    /// Anything that is not a JSON object, or whose known fields have the
    /// wrong type or an out-of-range value, is rejected as a whole. Unknown
    /// keys are ignored unless `strict` is set, in which case they reject too.
    pub fn parse(payload: &[u8], strict: bool) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let object = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ConfigError::Malformed(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        if strict {
            if let Some(unknown) = object.keys().find(|k| !KNOWN_FIELDS.contains(&k.as_str())) {
                return Err(ConfigError::UnknownField(unknown.clone()));
            }
        }

        let update: ConfigUpdate = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;

        update.validate()?;
        Ok(update)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threshold) = self.impact_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "impact_threshold",
                    reason: format!("{} is not a non-negative finite number", threshold),
                });
            }
        }
        Ok(())
    }

    /// True when applying this update changes nothing
    pub fn is_empty(&self) -> bool {
        self.impact_threshold.is_none()
            && !self.calibrate.unwrap_or(false)
            && !self.reset_stats.unwrap_or(false)
    }

    pub fn wants_calibration(&self) -> bool {
        self.calibrate.unwrap_or(false)
    }

    pub fn wants_stats_reset(&self) -> bool {
        self.reset_stats.unwrap_or(false)
    }

    /// Encode for writing to a device
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_update() {
        let update = ConfigUpdate::parse(
            br#"{"impact_threshold": 20.0, "calibrate": true, "reset_stats": false}"#,
            false,
        )
        .unwrap();
        assert_eq!(update.impact_threshold, Some(20.0));
        assert!(update.wants_calibration());
        assert!(!update.wants_stats_reset());
    }

    #[test]
    fn test_empty_object_is_empty_update() {
        let update = ConfigUpdate::parse(b"{}", false).unwrap();
        assert_eq!(update, ConfigUpdate::default());
        assert!(update.is_empty());
    }

    #[test]
    fn test_integer_threshold_accepted() {
        let update = ConfigUpdate::parse(br#"{"impact_threshold": 12}"#, false).unwrap();
        assert_eq!(update.impact_threshold, Some(12.0));
    }

    #[test]
    fn test_unknown_fields_ignored_when_lenient() {
        let update = ConfigUpdate::parse(br#"{"ping": true, "reset_stats": true}"#, false).unwrap();
        assert!(update.wants_stats_reset());
    }

    #[test]
    fn test_unknown_fields_rejected_when_strict() {
        let result = ConfigUpdate::parse(br#"{"ping": true}"#, true);
        assert!(matches!(result, Err(ConfigError::UnknownField(ref k)) if k == "ping"));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(matches!(
            ConfigUpdate::parse(b"{not json", false),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            ConfigUpdate::parse(b"[1, 2]", false),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            ConfigUpdate::parse(br#"{"impact_threshold": "high"}"#, false),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            ConfigUpdate::parse(br#"{"calibrate": 1}"#, false),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let result = ConfigUpdate::parse(br#"{"impact_threshold": -1.0}"#, false);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "impact_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let update = ConfigUpdate {
            impact_threshold: Some(15.0),
            calibrate: Some(false),
            reset_stats: None,
        };
        let json = String::from_utf8(update.to_json_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"{"impact_threshold":15.0,"calibrate":false}"#);
    }
}
