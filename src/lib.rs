// Drumstick - Impact detection and strike classification core
// Module declarations and the device / listener entry points

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod client;
pub mod config;
pub mod events;
pub mod motion;
pub mod pipeline;
pub mod sensor;
pub mod transport;

use client::{ClientConfig, ClientError, ClientEvent, DrumstickClient};
use config::{DeviceSettings, SettingsError};
use pipeline::{DeviceRunner, DrumstickController, RunSummary, RunnerError};
use sensor::{FixedBattery, ReplaySensor, SensorError, SensorSource, SyntheticConfig, SyntheticSensor, SystemClock};
use transport::{TcpLink, TransportError};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host-side wiring for the device loop
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Address the TCP link listens on
    pub bind: String,

    /// Replay a JSON-lines recording instead of the synthetic sensor
    pub replay: Option<PathBuf>,

    pub synthetic: SyntheticConfig,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        DeviceOptions {
            bind: "127.0.0.1:7878".to_string(),
            replay: None,
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Run the device loop until Ctrl-C or until a replay runs out
pub async fn run_device(
    settings: DeviceSettings,
    options: DeviceOptions,
) -> Result<RunSummary, RuntimeError> {
    settings.validate()?;

    let link = TcpLink::bind(&options.bind).await?;
    let sensor: Box<dyn SensorSource> = match &options.replay {
        Some(path) => Box::new(ReplaySensor::from_path(path)?),
        None => Box::new(SyntheticSensor::new(SyntheticConfig {
            sample_interval_ms: settings.sample_interval_ms,
            ..options.synthetic
        })),
    };
    let battery = Box::new(FixedBattery(settings.battery_voltage));

    let controller =
        DrumstickController::new(settings, sensor, Box::new(SystemClock::new()), battery, link);
    let runner = DeviceRunner::spawn(controller)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut watchdog = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                log::info!("Shutting down");
                break;
            }
            _ = watchdog.tick() => {
                if runner.is_finished() {
                    break;
                }
            }
        }
    }

    let summary = tokio::task::spawn_blocking(move || runner.stop())
        .await
        .map_err(|_| RunnerError::Panicked)??;
    Ok(summary)
}

/// Consumer run options
#[derive(Debug, Clone, Default)]
pub struct ListenerOptions {
    pub client: ClientConfig,

    /// Request a calibration after the first connect
    pub calibrate: bool,
}

/// Connect to a device and log its traffic until Ctrl-C
pub async fn run_listener(options: ListenerOptions) -> Result<(), RuntimeError> {
    let (handle, mut events) = DrumstickClient::spawn(options.client);
    let mut calibrate_pending = options.calibrate;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                break;
            }
            event = events.recv() => match event {
                Some(ClientEvent::Connected) => {
                    if calibrate_pending {
                        handle.calibrate().await?;
                        calibrate_pending = false;
                    }
                }
                Some(ClientEvent::Disconnected) => {
                    log::info!("Waiting for drumstick to come back");
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    let status = handle.status();
    log::info!(
        "Last status: {} hits, threshold {:.1}, battery {:.2} V",
        status.total_hits,
        status.impact_threshold,
        status.battery_level
    );
    Ok(())
}
