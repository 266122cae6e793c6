// Wire protocol
// Versioned JSON records for the event, status and config channels

use serde::{Deserialize, Serialize};

use crate::motion::types::{Direction, ImpactEvent};
use crate::transport::connection::ConnectionState;

pub const PROTOCOL_VERSION: u32 = 1;

/// The three logical channels the transport exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// A: impact notifications (device → consumer)
    Events,
    /// B: status notifications (device → consumer)
    Status,
    /// C: configuration writes (consumer → device)
    Config,
}

/// Reason a status record was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Welcome record right after a peer connects
    Connected,
    Calibrated,
    StatsReset,
    /// Heartbeat while connected
    Periodic,
    SensorFault,
}

impl StatusKind {
    pub fn default_message(&self) -> &'static str {
        match self {
            StatusKind::Connected => "Drumstick connected",
            StatusKind::Calibrated => "Calibration complete",
            StatusKind::StatsReset => "Statistics reset",
            StatusKind::Periodic => "Heartbeat",
            StatusKind::SensorFault => "Sensor fault",
        }
    }
}

/// Snapshot of device state, recomputed whenever a status record is built
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceStatus {
    pub connection_state: ConnectionState,
    pub total_hits: u32,
    pub uptime_ms: u64,
    pub battery_voltage: f32,
    pub impact_threshold: f32,
}

fn protocol_version() -> u32 {
    PROTOCOL_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRecord {
    #[serde(default)]
    pub velocity: f32,
    pub magnitude: f32,
    pub timestamp: u64,
    pub id: u32,
    pub device: String,
    pub battery: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default = "protocol_version")]
    pub version: u32,
}

impl ImpactRecord {
    pub fn from_event(event: &ImpactEvent, device: &str, battery: f32) -> Self {
        ImpactRecord {
            velocity: event.velocity,
            magnitude: event.magnitude,
            timestamp: event.timestamp_ms,
            id: event.sequence_id,
            device: device.to_string(),
            battery,
            direction: Some(event.direction),
            version: PROTOCOL_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: StatusKind,
    pub message: String,
    pub timestamp: u64,
    pub uptime: u64,
    pub total_hits: u32,
    pub battery: f32,
    pub threshold: f32,
    #[serde(default = "protocol_version")]
    pub version: u32,
}

impl StatusRecord {
    pub fn from_status(kind: StatusKind, message: impl Into<String>, status: &DeviceStatus) -> Self {
        StatusRecord {
            status: kind,
            message: message.into(),
            timestamp: status.uptime_ms,
            uptime: status.uptime_ms,
            total_hits: status.total_hits,
            battery: status.battery_voltage,
            threshold: status.impact_threshold,
            version: PROTOCOL_VERSION,
        }
    }
}

/// Any device → consumer record, tagged by `"type"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Impact(ImpactRecord),
    Status(StatusRecord),
}

impl Record {
    pub fn channel(&self) -> Channel {
        match self {
            Record::Impact(_) => Channel::Events,
            Record::Status(_) => Channel::Status,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
