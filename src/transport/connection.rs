// Connection state machine
// Advertise → connect → notify → disconnect → re-advertise, driven by polled link events

use thiserror::Error;

use crate::transport::protocol::{Channel, Record};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No peer connected")]
    NotConnected,

    #[error("Link channel closed")]
    ChannelClosed,

    #[error("Outbound queue full")]
    QueueFull,

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet advertising (startup, or advertising failed)
    Idle,
    /// Waiting for a peer
    Advertising,
    Connected { since_ms: u64 },
    /// Peer just left; advertising resumes at `until_ms`
    Settling { until_ms: u64 },
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Advertising => "advertising",
            ConnectionState::Connected { .. } => "connected",
            ConnectionState::Settling { .. } => "settling",
        }
    }
}

/// Raw notification from the underlying radio / socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    /// Write on the config channel
    Message(Vec<u8>),
}

/// What the transport reports back to the pipeline after a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    PeerConnected,
    PeerDisconnected,
    ConfigWrite(Vec<u8>),
}

/// Result of a best-effort notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Dropped,
}

/// Ordered message channel with connect/disconnect notifications
///
/// All methods are non-blocking; the sampling loop polls once per tick.
pub trait Link: Send {
    /// Make the device connectable again
    fn start_advertising(&mut self) -> Result<(), TransportError>;

    fn poll_event(&mut self) -> Option<LinkEvent>;

    /// Queue a notification on a channel. No acknowledgement is awaited.
    fn send(&mut self, channel: Channel, payload: &[u8]) -> Result<(), TransportError>;
}

/// Owns the connection lifecycle and record delivery
pub struct EventTransport<L: Link> {
    link: L,
    state: ConnectionState,
    grace_ms: u64,
    heartbeat_interval_ms: u64,
    last_heartbeat_ms: u64,
    sent: u64,
    dropped: u64,
}

impl<L: Link> EventTransport<L> {
    pub fn new(link: L, grace_ms: u64, heartbeat_interval_ms: u64) -> Self {
        EventTransport {
            link,
            state: ConnectionState::Idle,
            grace_ms,
            heartbeat_interval_ms,
            last_heartbeat_ms: 0,
            sent: 0,
            dropped: 0,
        }
    }

    /// Begin advertising. A failure is retried after the grace delay.
    pub fn start(&mut self, now_ms: u64) {
        self.try_advertise(now_ms);
    }

    /// Drain pending link events and advance the state machine
    pub fn poll(&mut self, now_ms: u64) -> Vec<TransportEvent> {
        let state = self.state;
        match state {
            ConnectionState::Idle => self.try_advertise(now_ms),
            ConnectionState::Settling { until_ms } if now_ms >= until_ms => {
                self.try_advertise(now_ms)
            }
            _ => {}
        }

        let mut events = Vec::new();
        while let Some(event) = self.link.poll_event() {
            match (event, self.state) {
                (LinkEvent::Connected, ConnectionState::Advertising) => {
                    log::info!("Peer connected");
                    self.state = ConnectionState::Connected { since_ms: now_ms };
                    self.last_heartbeat_ms = now_ms;
                    events.push(TransportEvent::PeerConnected);
                }
                (LinkEvent::Connected, state) => {
                    log::warn!("Ignoring connection while {}", state.as_str());
                }
                (LinkEvent::Disconnected, ConnectionState::Connected { since_ms }) => {
                    log::info!(
                        "Peer disconnected after {} ms ({} sent, {} dropped); re-advertising in {} ms",
                        now_ms.saturating_sub(since_ms),
                        self.sent,
                        self.dropped,
                        self.grace_ms
                    );
                    self.state = ConnectionState::Settling {
                        until_ms: now_ms + self.grace_ms,
                    };
                    events.push(TransportEvent::PeerDisconnected);
                }
                (LinkEvent::Disconnected, state) => {
                    log::debug!("Spurious disconnect while {}", state.as_str());
                }
                (LinkEvent::Message(payload), ConnectionState::Connected { .. }) => {
                    events.push(TransportEvent::ConfigWrite(payload));
                }
                (LinkEvent::Message(payload), state) => {
                    log::debug!(
                        "Dropping {}-byte write received while {}",
                        payload.len(),
                        state.as_str()
                    );
                }
            }
        }

        events
    }

    /// Serialize and notify. Silently dropped when no peer is connected.
    pub fn send(&mut self, record: &Record) -> Delivery {
        if !self.is_connected() {
            self.dropped += 1;
            return Delivery::Dropped;
        }

        let payload = match record.encode() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to encode record: {}", e);
                self.dropped += 1;
                return Delivery::Dropped;
            }
        };

        match self.link.send(record.channel(), &payload) {
            Ok(()) => {
                self.sent += 1;
                Delivery::Sent
            }
            Err(e) => {
                log::debug!("Notification dropped: {}", e);
                self.dropped += 1;
                Delivery::Dropped
            }
        }
    }

    /// True once per heartbeat interval while connected
    pub fn heartbeat_due(&mut self, now_ms: u64) -> bool {
        if !self.is_connected() {
            return false;
        }
        if now_ms.saturating_sub(self.last_heartbeat_ms) >= self.heartbeat_interval_ms {
            self.last_heartbeat_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn try_advertise(&mut self, now_ms: u64) {
        match self.link.start_advertising() {
            Ok(()) => {
                log::info!("Advertising");
                self.state = ConnectionState::Advertising;
            }
            Err(e) => {
                log::warn!("Failed to start advertising: {}; retrying in {} ms", e, self.grace_ms);
                self.state = ConnectionState::Settling {
                    until_ms: now_ms + self.grace_ms,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackLink;
    use crate::transport::protocol::{DeviceStatus, StatusKind, StatusRecord};

    fn status_record() -> Record {
        let status = DeviceStatus {
            connection_state: ConnectionState::Connected { since_ms: 0 },
            total_hits: 0,
            uptime_ms: 0,
            battery_voltage: 3.7,
            impact_threshold: 15.0,
        };
        Record::Status(StatusRecord::from_status(StatusKind::Periodic, "Heartbeat", &status))
    }

    fn connected_transport() -> EventTransport<LoopbackLink> {
        let mut transport = EventTransport::new(LoopbackLink::new(), 500, 30_000);
        transport.start(0);
        transport.link_mut().push_event(LinkEvent::Connected);
        assert_eq!(transport.poll(0), vec![TransportEvent::PeerConnected]);
        transport
    }

    #[test]
    fn test_start_advertises() {
        let mut transport = EventTransport::new(LoopbackLink::new(), 500, 30_000);
        assert_eq!(transport.state(), ConnectionState::Idle);
        transport.start(0);
        assert_eq!(transport.state(), ConnectionState::Advertising);
        assert_eq!(transport.link().advertise_count(), 1);
    }

    #[test]
    fn test_reconnect_after_disconnect() {
        let mut transport = connected_transport();

        transport.link_mut().push_event(LinkEvent::Disconnected);
        assert_eq!(transport.poll(1000), vec![TransportEvent::PeerDisconnected]);
        assert_eq!(transport.state(), ConnectionState::Settling { until_ms: 1500 });

        // Still settling, advertising not restarted yet
        assert!(transport.poll(1200).is_empty());
        assert_eq!(transport.link().advertise_count(), 1);

        assert!(transport.poll(1500).is_empty());
        assert_eq!(transport.state(), ConnectionState::Advertising);
        assert_eq!(transport.link().advertise_count(), 2);

        transport.link_mut().push_event(LinkEvent::Connected);
        assert_eq!(transport.poll(1600), vec![TransportEvent::PeerConnected]);
        assert!(transport.is_connected());
    }

    #[test]
    fn test_records_dropped_without_peer() {
        let mut transport = EventTransport::new(LoopbackLink::new(), 500, 30_000);
        transport.start(0);
        assert_eq!(transport.send(&status_record()), Delivery::Dropped);
        assert!(transport.link().sent().is_empty());
        assert_eq!(transport.dropped_count(), 1);
    }

    #[test]
    fn test_records_sent_on_matching_channel() {
        let mut transport = connected_transport();
        assert_eq!(transport.send(&status_record()), Delivery::Sent);
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(transport.dropped_count(), 0);

        let sent = transport.link().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Channel::Status);
        let decoded = Record::decode(&sent[0].1).unwrap();
        assert_eq!(decoded, status_record());
    }

    #[test]
    fn test_link_failure_is_a_drop_not_an_error() {
        let mut transport = connected_transport();
        transport.link_mut().fail_sends(true);
        assert_eq!(transport.send(&status_record()), Delivery::Dropped);
        assert!(transport.is_connected());
    }

    #[test]
    fn test_config_writes_only_while_connected() {
        let mut transport = EventTransport::new(LoopbackLink::new(), 500, 30_000);
        transport.start(0);
        transport.link_mut().push_event(LinkEvent::Message(b"{}".to_vec()));
        assert!(transport.poll(0).is_empty());

        transport.link_mut().push_event(LinkEvent::Connected);
        transport.link_mut().push_event(LinkEvent::Message(b"{}".to_vec()));
        assert_eq!(
            transport.poll(10),
            vec![
                TransportEvent::PeerConnected,
                TransportEvent::ConfigWrite(b"{}".to_vec())
            ]
        );
    }

    #[test]
    fn test_heartbeat_interval() {
        let mut transport = connected_transport();
        assert!(!transport.heartbeat_due(29_999));
        assert!(transport.heartbeat_due(30_000));
        assert!(!transport.heartbeat_due(30_010));
        assert!(transport.heartbeat_due(60_000));
    }

    #[test]
    fn test_no_heartbeat_while_advertising() {
        let mut transport = EventTransport::new(LoopbackLink::new(), 500, 30_000);
        transport.start(0);
        assert!(!transport.heartbeat_due(100_000));
    }

    #[test]
    fn test_advertise_failure_retries_after_grace() {
        let mut link = LoopbackLink::new();
        link.fail_advertising(true);
        let mut transport = EventTransport::new(link, 500, 30_000);
        transport.start(0);
        assert_eq!(transport.state(), ConnectionState::Settling { until_ms: 500 });

        transport.link_mut().fail_advertising(false);
        transport.poll(100);
        assert!(matches!(transport.state(), ConnectionState::Settling { .. }));
        transport.poll(500);
        assert_eq!(transport.state(), ConnectionState::Advertising);
    }
}
