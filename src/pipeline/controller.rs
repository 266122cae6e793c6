// Device controller
// One sampling tick: transport upkeep, sensor health, gravity, detection, classification, emission

use crate::config::{ConfigUpdate, DeviceSettings};
use crate::events::calibration::{CalibrationError, CalibrationReport, CalibrationRoutine};
use crate::events::classifier::{DirectionGate, StrikeClassifier};
use crate::events::detector::ImpactDetector;
use crate::motion::gravity::{GravityTracker, STANDARD_GRAVITY};
use crate::motion::health::{FaultAction, FaultRecovery, SampleHealthMonitor};
use crate::motion::types::ImpactEvent;
use crate::motion::vector::Vec3;
use crate::sensor::{BatteryGauge, Clock, SensorError, SensorSource};
use crate::transport::connection::{EventTransport, Link, TransportEvent};
use crate::transport::protocol::{DeviceStatus, ImpactRecord, Record, StatusKind, StatusRecord};

/// Mutable detector state owned by the sampling loop
///
/// Config writes reach it only through the loop's own transport poll, so
/// no tick ever observes a half-applied update.
pub struct DetectorState {
    pub gravity: GravityTracker,
    pub detector: ImpactDetector,
    pub recovery: FaultRecovery,
}

impl DetectorState {
    pub fn from_settings(settings: &DeviceSettings) -> Self {
        DetectorState {
            gravity: GravityTracker::new(settings.gravity_alpha),
            detector: ImpactDetector::new(settings.detector_config()),
            recovery: FaultRecovery::new(settings.fault_reset_after, settings.fault_retry_ms),
        }
    }
}

/// What happened on one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Healthy sample, nothing crossed the threshold
    Quiet,
    /// Impact detected and handed to the transport
    Impact(ImpactEvent),
    /// Impact detected but filtered out by the direction gate
    Suppressed(ImpactEvent),
    /// Degenerate or failed reading, tick skipped
    SensorFault,
    /// Waiting for the next sensor reset attempt
    SensorBlocked,
    /// Sample source has no more data
    Exhausted,
}

pub struct DrumstickController<L: Link> {
    settings: DeviceSettings,
    state: DetectorState,
    classifier: StrikeClassifier,
    gate: DirectionGate,
    calibration: CalibrationRoutine,
    sensor: Box<dyn SensorSource>,
    clock: Box<dyn Clock>,
    battery: Box<dyn BatteryGauge>,
    transport: EventTransport<L>,
}

impl<L: Link> DrumstickController<L> {
    pub fn new(
        settings: DeviceSettings,
        sensor: Box<dyn SensorSource>,
        clock: Box<dyn Clock>,
        battery: Box<dyn BatteryGauge>,
        link: L,
    ) -> Self {
        let state = DetectorState::from_settings(&settings);
        let classifier = StrikeClassifier::with_config(settings.classifier.clone());
        let calibration = CalibrationRoutine::new(
            settings.calibration_samples,
            settings.sample_interval_ms,
            settings.calibration_max_spread,
        );
        let transport = EventTransport::new(
            link,
            settings.disconnect_grace_ms,
            settings.heartbeat_interval_ms,
        );

        DrumstickController {
            gate: settings.direction_gate,
            settings,
            state,
            classifier,
            calibration,
            sensor,
            clock,
            battery,
            transport,
        }
    }

    /// Startup sequence: establish a gravity baseline, then start advertising.
    ///
    /// Calibration is retried up to `calibration_attempts` times. If every
    /// attempt fails the device keeps going with standard gravity.
    pub fn boot(&mut self) -> Option<CalibrationReport> {
        log::info!(
            "{} starting: threshold {:.1} m/s², cooldown {} ms, tick {} ms, gravity alpha {:.3}",
            self.settings.device_name,
            self.state.detector.threshold(),
            self.state.detector.cooldown_ms(),
            self.settings.sample_interval_ms,
            self.state.gravity.alpha()
        );
        log::info!(
            "Calibrating over {} samples; keep the stick still",
            self.calibration.window_samples()
        );

        let attempts = self.settings.calibration_attempts.max(1);
        let mut report = None;
        for attempt in 1..=attempts {
            match self.calibrate() {
                Ok(r) => {
                    report = Some(r);
                    break;
                }
                Err(e) => log::warn!("Boot calibration attempt {}/{} failed: {}", attempt, attempts, e),
            }
        }

        if report.is_none() {
            log::error!(
                "Calibration failed {} times; using standard gravity (0, 0, {})",
                attempts,
                STANDARD_GRAVITY
            );
            self.state
                .gravity
                .reset_to(Vec3::new(0.0, 0.0, STANDARD_GRAVITY));
        }

        let now_ms = self.clock.now_ms();
        self.transport.start(now_ms);
        report
    }

    /// Run one sampling tick
    pub fn tick(&mut self) -> TickOutcome {
        let now_ms = self.clock.now_ms();

        for event in self.transport.poll(now_ms) {
            self.handle_transport_event(event);
        }

        if self.transport.heartbeat_due(now_ms) {
            self.send_status(StatusKind::Periodic, StatusKind::Periodic.default_message());
        }

        if self.state.recovery.is_blocked() {
            if !self.state.recovery.retry_due(now_ms) {
                return TickOutcome::SensorBlocked;
            }
            self.reinitialize_sensor(now_ms);
            if self.state.recovery.is_blocked() {
                return TickOutcome::SensorBlocked;
            }
        }

        let sample = match self.sensor.read_sample() {
            Ok(sample) => sample,
            Err(SensorError::EndOfStream) => return TickOutcome::Exhausted,
            Err(e) => {
                log::warn!("Sensor read failed: {}", e);
                self.on_degenerate(now_ms);
                return TickOutcome::SensorFault;
            }
        };

        // Must short-circuit before the gravity update
        if SampleHealthMonitor::is_degenerate(&sample) {
            self.on_degenerate(now_ms);
            return TickOutcome::SensorFault;
        }
        self.state.recovery.on_healthy();

        // Motion is measured against the estimate from before this sample
        let gravity = self.state.gravity.estimate();
        let motion = sample.acceleration - gravity;
        self.state.gravity.update(sample.acceleration);

        let impact = match self.state.detector.evaluate(motion, now_ms) {
            Some(impact) => impact,
            None => return TickOutcome::Quiet,
        };

        let classification = self.classifier.classify_detailed(motion, gravity);
        let event = impact.classified(classification.direction);

        if !self.gate.allows(event.direction) {
            log::debug!(
                "Suppressed {} impact #{} (mag {:.2}, alignment {:.2})",
                event.direction.as_str(),
                event.sequence_id,
                event.magnitude,
                classification.alignment
            );
            return TickOutcome::Suppressed(event);
        }

        log::info!(
            "Impact #{}: {} mag {:.2} m/s² vel {:.3} at {} ms",
            event.sequence_id,
            event.direction.as_str(),
            event.magnitude,
            event.velocity,
            event.timestamp_ms
        );

        let battery = self.battery.voltage();
        let record = ImpactRecord::from_event(&event, &self.settings.device_name, battery);
        self.transport.send(&Record::Impact(record));

        TickOutcome::Impact(event)
    }

    /// Apply a parsed config update: threshold, then calibrate, then stats reset
    pub fn apply_config(&mut self, update: &ConfigUpdate) {
        if update.is_empty() {
            log::debug!("Empty config update");
            return;
        }

        if let Some(threshold) = update.impact_threshold {
            log::info!(
                "Impact threshold {:.1} -> {:.1} m/s²",
                self.state.detector.threshold(),
                threshold
            );
            self.state.detector.set_threshold(threshold);
        }

        if update.wants_calibration() {
            match self.calibrate() {
                Ok(_) => self.send_status(
                    StatusKind::Calibrated,
                    StatusKind::Calibrated.default_message(),
                ),
                Err(e) => log::warn!("Requested calibration failed: {}", e),
            }
        }

        if update.wants_stats_reset() {
            log::info!("Resetting hit counter ({} hits)", self.state.detector.total_hits());
            self.state.detector.reset_sequence();
            self.send_status(
                StatusKind::StatsReset,
                StatusKind::StatsReset.default_message(),
            );
        }
    }

    /// Current device status snapshot
    pub fn status(&mut self) -> DeviceStatus {
        DeviceStatus {
            connection_state: self.transport.state(),
            total_hits: self.state.detector.total_hits(),
            uptime_ms: self.clock.now_ms(),
            battery_voltage: self.battery.voltage(),
            impact_threshold: self.state.detector.threshold(),
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn transport(&self) -> &EventTransport<L> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut EventTransport<L> {
        &mut self.transport
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn sleep_ms(&self, ms: u64) {
        self.clock.sleep_ms(ms);
    }

    fn calibrate(&mut self) -> Result<CalibrationReport, CalibrationError> {
        self.calibration
            .calibrate(self.sensor.as_mut(), self.clock.as_ref(), &mut self.state.gravity)
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerConnected => {
                self.send_status(StatusKind::Connected, StatusKind::Connected.default_message());
            }
            TransportEvent::PeerDisconnected => {}
            TransportEvent::ConfigWrite(payload) => {
                match ConfigUpdate::parse(&payload, self.settings.strict_config) {
                    Ok(update) => self.apply_config(&update),
                    Err(e) => log::warn!("Rejected config write: {}", e),
                }
            }
        }
    }

    fn on_degenerate(&mut self, now_ms: u64) {
        match self.state.recovery.on_degenerate() {
            FaultAction::Skip => log::debug!("Skipping degenerate sample"),
            FaultAction::Reinitialize => self.reinitialize_sensor(now_ms),
        }
    }

    fn reinitialize_sensor(&mut self, now_ms: u64) {
        log::warn!("Sensor stalled; reinitializing");
        match self.sensor.reinitialize() {
            Ok(()) => {
                self.state.recovery.record_reinit(true, now_ms);
                log::info!("Sensor reinitialized");
                self.send_status(StatusKind::SensorFault, "Sensor reinitialized");
            }
            Err(e) => {
                self.state.recovery.record_reinit(false, now_ms);
                log::error!(
                    "Sensor reset failed ({} in a row): {}; retrying in {} ms",
                    self.state.recovery.failed_attempts(),
                    e,
                    self.settings.fault_retry_ms
                );
                self.send_status(StatusKind::SensorFault, format!("Sensor reset failed: {}", e));
            }
        }
    }

    fn send_status(&mut self, kind: StatusKind, message: impl Into<String>) {
        let status = self.status();
        let record = StatusRecord::from_status(kind, message, &status);
        self.transport.send(&Record::Status(record));
    }
}
