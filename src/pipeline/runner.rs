// Sampling loop runner
// Drives the controller at a fixed rate on a dedicated thread until stopped

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::controller::{DrumstickController, TickOutcome};
use crate::transport::connection::Link;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn sampling thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Sampling thread panicked")]
    Panicked,
}

/// Counters collected over one run of the loop
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub impacts: u64,
    pub suppressed: u64,
    pub sensor_faults: u64,
    pub blocked_ticks: u64,
    /// Loop ended because the sample source ran dry
    pub exhausted: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Quiet => {}
            TickOutcome::Impact(_) => self.impacts += 1,
            TickOutcome::Suppressed(_) => self.suppressed += 1,
            TickOutcome::SensorFault => self.sensor_faults += 1,
            TickOutcome::SensorBlocked => self.blocked_ticks += 1,
            TickOutcome::Exhausted => self.exhausted = true,
        }
    }
}

/// Boot the controller and tick it every `sample_interval_ms` until `stop`
/// is raised or the sensor runs out of samples.
///
/// Ticks that overrun the interval are not made up; the next one starts
/// immediately.
pub fn run_loop<L: Link>(controller: &mut DrumstickController<L>, stop: &AtomicBool) -> RunSummary {
    let interval_ms = controller.settings().sample_interval_ms;
    let mut summary = RunSummary::default();

    controller.boot();

    while !stop.load(Ordering::SeqCst) {
        let started = controller.now_ms();
        let outcome = controller.tick();
        summary.record(&outcome);
        if outcome == TickOutcome::Exhausted {
            log::info!("Sample source exhausted after {} ticks", summary.ticks);
            break;
        }

        let elapsed = controller.now_ms().saturating_sub(started);
        controller.sleep_ms(interval_ms.saturating_sub(elapsed));
    }

    log::info!(
        "Sampling loop stopped: {} ticks, {} impacts, {} suppressed, {} sensor faults",
        summary.ticks,
        summary.impacts,
        summary.suppressed,
        summary.sensor_faults
    );
    summary
}

/// Handle to the sampling thread
pub struct DeviceRunner {
    stop_signal: Arc<AtomicBool>,
    handle: JoinHandle<RunSummary>,
}

impl DeviceRunner {
    /// Move the controller onto its own thread and start sampling
    pub fn spawn<L: Link + 'static>(mut controller: DrumstickController<L>) -> Result<Self, RunnerError> {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);

        let handle = thread::Builder::new()
            .name("drumstick-loop".to_string())
            .spawn(move || run_loop(&mut controller, &stop))?;

        Ok(DeviceRunner {
            stop_signal,
            handle,
        })
    }

    /// True once the loop has exited on its own (e.g. replay finished)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for it
    pub fn stop(self) -> Result<RunSummary, RunnerError> {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.handle.join().map_err(|_| RunnerError::Panicked)
    }
}
