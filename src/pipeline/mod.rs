// Pipeline module
// Per-tick sampling pipeline and the loop thread that drives it

pub mod controller;
pub mod runner;

pub use controller::{DetectorState, DrumstickController, TickOutcome};
pub use runner::{run_loop, DeviceRunner, RunSummary, RunnerError};
