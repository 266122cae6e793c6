// Event detection module
// Impact detection, strike direction classification and gravity calibration

pub mod calibration;
pub mod classifier;
pub mod detector;

pub use calibration::{CalibrationError, CalibrationReport, CalibrationRoutine};
pub use classifier::{ClassifierConfig, DirectionGate, StrikeClassification, StrikeClassifier};
pub use detector::{DetectorConfig, Impact, ImpactDetector, VelocityModel};
