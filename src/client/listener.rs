// Drumstick consumer client
// Keeps a connection to the device alive, forwards its records and writes config commands

use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::client::status::DrumstickStatus;
use crate::config::ConfigUpdate;
use crate::transport::framing::{is_blank, Frame, LineReader, MAX_RECORD_LINE};
use crate::transport::protocol::{ImpactRecord, Record, StatusRecord};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Client task has stopped")]
    Closed,

    #[error("Invalid impact threshold: {0}")]
    InvalidThreshold(f32),
}

/// Something the consumer should know about
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    Impact(ImpactRecord),
    Status(StatusRecord),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device address, host:port
    pub address: String,

    /// Threshold written to the device on every (re)connect
    pub initial_threshold: f32,

    /// Wait between connection attempts
    pub reconnect_interval: Duration,

    /// Liveness write interval while connected
    pub ping_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            address: "127.0.0.1:7878".to_string(),
            initial_threshold: 15.0,
            reconnect_interval: Duration::from_secs(5),
            ping_interval: Duration::from_secs(5),
        }
    }
}

/// Command side of a running client
///
/// Dropping every handle shuts the client task down.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<ConfigUpdate>,
    status: watch::Receiver<DrumstickStatus>,
}

impl ClientHandle {
    pub async fn calibrate(&self) -> Result<(), ClientError> {
        self.send(ConfigUpdate {
            calibrate: Some(true),
            ..ConfigUpdate::default()
        })
        .await
    }

    pub async fn set_impact_threshold(&self, threshold: f32) -> Result<(), ClientError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ClientError::InvalidThreshold(threshold));
        }
        self.send(ConfigUpdate {
            impact_threshold: Some(threshold),
            ..ConfigUpdate::default()
        })
        .await
    }

    pub async fn reset_statistics(&self) -> Result<(), ClientError> {
        self.send(ConfigUpdate {
            reset_stats: Some(true),
            ..ConfigUpdate::default()
        })
        .await
    }

    /// Queue a config write. Writes made while disconnected are discarded.
    pub async fn send(&self, update: ConfigUpdate) -> Result<(), ClientError> {
        self.commands.send(update).await.map_err(|_| ClientError::Closed)
    }

    pub fn status(&self) -> DrumstickStatus {
        self.status.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().connected
    }
}

/// Reconnecting consumer for a drumstick device
pub struct DrumstickClient {
    config: ClientConfig,
    commands: mpsc::Receiver<ConfigUpdate>,
    events: mpsc::Sender<ClientEvent>,
    status: watch::Sender<DrumstickStatus>,
}

enum SessionEnd {
    Disconnected,
    Shutdown,
}

impl DrumstickClient {
    /// Start the client on the current tokio runtime
    pub fn spawn(config: ClientConfig) -> (ClientHandle, mpsc::Receiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(256);
        let (status_tx, status_rx) = watch::channel(DrumstickStatus {
            impact_threshold: config.initial_threshold,
            ..DrumstickStatus::default()
        });

        let client = DrumstickClient {
            config,
            commands: command_rx,
            events: event_tx,
            status: status_tx,
        };
        tokio::spawn(client.run());

        (
            ClientHandle {
                commands: command_tx,
                status: status_rx,
            },
            event_rx,
        )
    }

    async fn run(mut self) {
        log::info!("Looking for drumstick at {}", self.config.address);
        loop {
            match TcpStream::connect(&self.config.address).await {
                Ok(stream) => {
                    log::info!("Connected to drumstick at {}", self.config.address);
                    let end = self.session(stream).await;
                    self.status.send_modify(|s| s.set_connected(false));
                    log::info!("Disconnected from drumstick");
                    if self.events.send(ClientEvent::Disconnected).await.is_err() {
                        break;
                    }
                    if let SessionEnd::Shutdown = end {
                        break;
                    }
                }
                Err(e) => log::debug!("Drumstick not reachable: {}", e),
            }

            if !self.wait_for_retry().await {
                break;
            }
        }
        log::debug!("Client task exiting");
    }

    /// Sleep out the reconnect interval. False when the client should stop.
    async fn wait_for_retry(&mut self) -> bool {
        let deadline = Instant::now() + self.config.reconnect_interval;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return true,
                command = self.commands.recv() => match command {
                    Some(update) => log::warn!("Cannot send config {:?}: not connected", update),
                    None => return false,
                },
            }
        }
    }

    async fn session(&mut self, stream: TcpStream) -> SessionEnd {
        let (reader, mut writer) = stream.into_split();
        let mut frames = LineReader::new(reader, MAX_RECORD_LINE);

        let initial = ConfigUpdate {
            impact_threshold: Some(self.config.initial_threshold),
            calibrate: Some(false),
            reset_stats: None,
        };
        if !write_update(&mut writer, &initial).await {
            return SessionEnd::Disconnected;
        }

        self.status.send_modify(|s| s.set_connected(true));
        if self.events.send(ClientEvent::Connected).await.is_err() {
            return SessionEnd::Shutdown;
        }

        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.tick().await;

        loop {
            tokio::select! {
                frame = frames.next_frame() => match frame {
                    Ok(Some(Frame::Line(line))) => {
                        if !self.handle_line(&line).await {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Ok(Some(Frame::Oversized)) => {
                        log::warn!("Skipping record over {} bytes", MAX_RECORD_LINE);
                    }
                    Ok(None) => return SessionEnd::Disconnected,
                    Err(e) => {
                        log::warn!("Read from drumstick failed: {}", e);
                        return SessionEnd::Disconnected;
                    }
                },
                _ = ping.tick() => {
                    if !write_line(&mut writer, br#"{"ping":true}"#).await {
                        log::warn!("Connection health check failed");
                        return SessionEnd::Disconnected;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(update) => {
                        if !write_update(&mut writer, &update).await {
                            return SessionEnd::Disconnected;
                        }
                    }
                    None => return SessionEnd::Shutdown,
                },
            }
        }
    }

    /// Forward one record line. False when nobody is listening any more.
    async fn handle_line(&mut self, line: &[u8]) -> bool {
        if is_blank(line) {
            return true;
        }

        let event = match Record::decode(line) {
            Ok(Record::Impact(impact)) => {
                log::info!(
                    "Impact #{} mag {:.2} ({})",
                    impact.id,
                    impact.magnitude,
                    impact.direction.map(|d| d.as_str()).unwrap_or("unknown")
                );
                self.status.send_modify(|s| s.touch());
                ClientEvent::Impact(impact)
            }
            Ok(Record::Status(status)) => {
                log::info!("Status {:?}: {}", status.status, status.message);
                self.status.send_modify(|s| s.apply_status(&status));
                ClientEvent::Status(status)
            }
            Err(e) => {
                log::warn!("Skipping unparsable record: {}", e);
                return true;
            }
        };

        self.events.send(event).await.is_ok()
    }
}

async fn write_update(writer: &mut OwnedWriteHalf, update: &ConfigUpdate) -> bool {
    match update.to_json_bytes() {
        Ok(payload) => {
            let sent = write_line(writer, &payload).await;
            if sent {
                log::info!("Config sent: {}", String::from_utf8_lossy(&payload));
            }
            sent
        }
        Err(e) => {
            log::error!("Failed to encode config: {}", e);
            true
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, payload: &[u8]) -> bool {
    let mut line = Vec::with_capacity(payload.len() + 1);
    line.extend_from_slice(payload);
    line.push(b'\n');
    match writer.write_all(&line).await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Write to drumstick failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceSettings;
    use crate::motion::types::Direction;
    use crate::pipeline::{DeviceRunner, DrumstickController};
    use crate::sensor::{FixedBattery, SyntheticConfig, SyntheticSensor, SystemClock};
    use crate::transport::protocol::StatusKind;
    use crate::transport::tcp::TcpLink;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(3);

    fn test_config(address: String) -> ClientConfig {
        ClientConfig {
            address,
            initial_threshold: 15.0,
            reconnect_interval: Duration::from_millis(50),
            ping_interval: Duration::from_secs(3600),
        }
    }

    async fn next_event(events: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
        timeout(WAIT, events.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_initial_config_records_and_commands() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (handle, mut events) = DrumstickClient::spawn(test_config(address));

        let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let first = lines.next_line().await.unwrap().unwrap();
        assert_eq!(first, r#"{"impact_threshold":15.0,"calibrate":false}"#);
        assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
        assert!(handle.is_connected());

        writer
            .write_all(b"{\"type\":\"impact\",\"velocity\":0.19,\"magnitude\":19.0,\"timestamp\":1000,\"id\":1,\"device\":\"VODKA-Drumstick\",\"battery\":3.7,\"direction\":\"down\",\"version\":1}\n")
            .await
            .unwrap();
        match next_event(&mut events).await {
            ClientEvent::Impact(impact) => {
                assert_eq!(impact.id, 1);
                assert_eq!(impact.direction, Some(Direction::Down));
            }
            other => panic!("expected impact, got {:?}", other),
        }

        writer.write_all(b"not a record\n").await.unwrap();
        let mut oversized = vec![b'x'; MAX_RECORD_LINE * 2];
        oversized.push(b'\n');
        writer.write_all(&oversized).await.unwrap();
        writer
            .write_all(b"{\"type\":\"status\",\"status\":\"periodic\",\"message\":\"Heartbeat\",\"timestamp\":30000,\"uptime\":30000,\"total_hits\":12,\"battery\":3.6,\"threshold\":15.0}\n")
            .await
            .unwrap();
        match next_event(&mut events).await {
            ClientEvent::Status(status) => assert_eq!(status.status, StatusKind::Periodic),
            other => panic!("expected status, got {:?}", other),
        }
        assert_eq!(handle.status().total_hits, 12);
        assert!(handle.status().last_seen.is_some());

        handle.calibrate().await.unwrap();
        handle.set_impact_threshold(18.5).await.unwrap();
        handle.reset_statistics().await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"calibrate":true}"#);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"impact_threshold":18.5}"#);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"reset_stats":true}"#);

        assert!(matches!(
            handle.set_impact_threshold(-1.0).await,
            Err(ClientError::InvalidThreshold(_))
        ));
    }

    #[tokio::test]
    async fn test_reconnects_after_device_drops() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (handle, mut events) = DrumstickClient::spawn(test_config(address));

        let (first, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
        drop(first);
        assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);
        assert!(!handle.is_connected());

        let (_second, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    }

    #[tokio::test]
    async fn test_ping_while_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (_handle, _events) = DrumstickClient::spawn(ClientConfig {
            ping_interval: Duration::from_millis(20),
            ..test_config(address)
        });

        let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let mut lines = BufReader::new(stream).lines();
        lines.next_line().await.unwrap().unwrap();
        let ping = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
        assert_eq!(ping, r#"{"ping":true}"#);
    }

    #[tokio::test]
    async fn test_end_to_end_with_device_loop() {
        let link = TcpLink::bind("127.0.0.1:0").await.unwrap();
        let address = link.local_addr().to_string();

        let settings = DeviceSettings {
            sample_interval_ms: 1,
            calibration_samples: 5,
            ..DeviceSettings::default()
        };
        let sensor = SyntheticSensor::new(SyntheticConfig {
            sample_interval_ms: 1,
            strike_period_ms: 40,
            ..SyntheticConfig::default()
        });
        let controller = DrumstickController::new(
            settings,
            Box::new(sensor),
            Box::new(SystemClock::new()),
            Box::new(FixedBattery(3.7)),
            link,
        );
        let runner = DeviceRunner::spawn(controller).unwrap();

        let (handle, mut events) = DrumstickClient::spawn(test_config(address));
        assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

        let mut welcomed = false;
        let mut impact = None;
        while impact.is_none() {
            match next_event(&mut events).await {
                ClientEvent::Status(status) if status.status == StatusKind::Connected => {
                    welcomed = true
                }
                ClientEvent::Impact(record) => impact = Some(record),
                _ => {}
            }
        }
        assert!(welcomed);
        let impact = impact.unwrap();
        assert_eq!(impact.device, "VODKA-Drumstick");
        assert_eq!(impact.direction, Some(Direction::Down));

        handle.reset_statistics().await.unwrap();
        loop {
            if let ClientEvent::Status(status) = next_event(&mut events).await {
                if status.status == StatusKind::StatsReset {
                    break;
                }
            }
        }

        drop(handle);
        let summary = runner.stop().unwrap();
        assert!(summary.impacts > 0);
    }
}
