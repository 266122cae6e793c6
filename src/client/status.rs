// Consumer-side device status
// Last known drumstick state, folded from status records and impact traffic

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::transport::protocol::StatusRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrumstickStatus {
    pub connected: bool,
    pub battery_level: f32,
    pub total_hits: u32,
    pub uptime_ms: u64,
    pub impact_threshold: f32,
    /// Wall-clock time of the last record received from the device
    pub last_seen: Option<DateTime<Utc>>,
}

impl Default for DrumstickStatus {
    fn default() -> Self {
        DrumstickStatus {
            connected: false,
            battery_level: 0.0,
            total_hits: 0,
            uptime_ms: 0,
            impact_threshold: 15.0,
            last_seen: None,
        }
    }
}

impl DrumstickStatus {
    pub fn apply_status(&mut self, record: &StatusRecord) {
        self.total_hits = record.total_hits;
        self.uptime_ms = record.uptime;
        self.battery_level = record.battery;
        self.impact_threshold = record.threshold;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_seen = Some(Utc::now());
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if connected {
            self.touch();
        }
    }

    /// Time since the device was last heard from
    pub fn silence(&self) -> Option<chrono::Duration> {
        self.last_seen.map(|seen| Utc::now() - seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::protocol::{StatusKind, PROTOCOL_VERSION};

    #[test]
    fn test_status_record_updates_fields() {
        let mut status = DrumstickStatus::default();
        assert!(status.last_seen.is_none());

        status.apply_status(&StatusRecord {
            status: StatusKind::Periodic,
            message: "Heartbeat".to_string(),
            timestamp: 60_000,
            uptime: 60_000,
            total_hits: 42,
            battery: 3.6,
            threshold: 18.0,
            version: PROTOCOL_VERSION,
        });

        assert_eq!(status.total_hits, 42);
        assert_eq!(status.uptime_ms, 60_000);
        assert_eq!(status.battery_level, 3.6);
        assert_eq!(status.impact_threshold, 18.0);
        assert!(status.last_seen.is_some());
        assert!(status.silence().unwrap() >= chrono::Duration::zero());
    }

    #[test]
    fn test_disconnect_keeps_last_seen() {
        let mut status = DrumstickStatus::default();
        status.set_connected(true);
        let seen = status.last_seen;
        status.set_connected(false);
        assert!(!status.connected);
        assert_eq!(status.last_seen, seen);
    }
}
