// Drumstick command line
// `device` runs the sampling loop behind a TCP link, `listen` runs a consumer

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use drumstick_lib::client::ClientConfig;
use drumstick_lib::config::DeviceSettings;
use drumstick_lib::sensor::SyntheticConfig;
use drumstick_lib::{run_device, run_listener, DeviceOptions, ListenerOptions, RuntimeError};

#[derive(Parser, Debug)]
#[command(name = "drumstick")]
#[command(about = "Drumstick impact detection device and consumer", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the device sampling loop
    Device {
        /// Address to accept a consumer on
        #[arg(long, default_value = "127.0.0.1:7878")]
        bind: String,

        /// Device settings JSON file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Replay recorded samples (JSON lines) instead of the synthetic sensor
        #[arg(long, value_name = "FILE")]
        replay: Option<PathBuf>,

        /// Synthetic strike spacing, 0 for none
        #[arg(long, default_value_t = 1000)]
        strike_period_ms: u64,

        /// Synthetic strike motion magnitude (m/s²)
        #[arg(long, default_value_t = 19.0)]
        strike_peak: f32,
    },

    /// Connect to a device and log its events
    Listen {
        #[arg(long, default_value = "127.0.0.1:7878")]
        connect: String,

        /// Threshold written on every connect
        #[arg(long, default_value_t = 15.0)]
        threshold: f32,

        /// Ask the device to recalibrate once connected
        #[arg(long, default_value_t = false)]
        calibrate: bool,
    },
}

async fn run(args: Args) -> Result<(), RuntimeError> {
    match args.command {
        Command::Device {
            bind,
            config,
            replay,
            strike_period_ms,
            strike_peak,
        } => {
            let settings = match config {
                Some(path) => DeviceSettings::load(&path)?,
                None => DeviceSettings::default(),
            };
            let options = DeviceOptions {
                bind,
                replay,
                synthetic: SyntheticConfig {
                    strike_period_ms,
                    strike_peak,
                    ..SyntheticConfig::default()
                },
            };
            let summary = run_device(settings, options).await?;
            match serde_json::to_string(&summary) {
                Ok(json) => log::info!("Run summary: {}", json),
                Err(e) => log::warn!("Could not encode run summary: {}", e),
            }
        }
        Command::Listen {
            connect,
            threshold,
            calibrate,
        } => {
            let options = ListenerOptions {
                client: ClientConfig {
                    address: connect,
                    initial_threshold: threshold,
                    reconnect_interval: Duration::from_secs(5),
                    ping_interval: Duration::from_secs(5),
                },
                calibrate,
            };
            run_listener(options).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
