//! Per-axis control loop orchestration.
//!
//! The controller owns one Kalman filter and one PID per axis. Reader
//! threads push decoded measurements in through [`ingest_sample`] /
//! [`ingest_record`]; three control ticks and one transmit tick run on
//! their own timer threads once [`start`] is called.
//!
//! Locking follows a single-writer discipline per slot: the reader is the
//! only writer of an axis's estimate, its control tick is the only writer
//! of the PID state and the output slot, and the transmit tick is the
//! only writer of the reused frame buffer.
//!
//! [`ingest_sample`]: CageController::ingest_sample
//! [`ingest_record`]: CageController::ingest_record
//! [`start`]: CageController::start

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use control::{Axis, PidController, ScalarKalman};
use hardware::coil::{encode_command, ChecksumScheme, CoilPort, FRAME_LEN};
use hardware::mdl::TelemetryRecord;
use hardware::mfg::FieldSample;
use tracing::{info, trace, warn};

use crate::config::CageConfig;

/// One published estimate, handed to the observer per axis per sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldUpdate {
    pub axis: Axis,
    /// Filtered field estimate.
    pub filtered: f64,
    /// Setpoint minus filtered estimate.
    pub error: f64,
}

type Observer = dyn Fn(FieldUpdate) + Send + Sync;

/// Estimator slot written by the reader and read by the control tick.
struct AxisEstimate {
    filter: ScalarKalman,
    filtered: f64,
    setpoint: f64,
    /// Whether the filter has been seeded from a real sample yet.
    seeded: bool,
}

struct AxisLoop {
    estimate: Mutex<AxisEstimate>,
    pid: Mutex<PidController>,
    output: Mutex<f64>,
}

impl AxisLoop {
    fn new(config: &CageConfig) -> Self {
        let c = &config.control;
        let mut pid = PidController::new(c.kp, c.ki, c.kd);
        pid.set_output_limits(c.output_min, c.output_max);
        Self {
            estimate: Mutex::new(AxisEstimate {
                filter: ScalarKalman::with_noise(0.0, c.process_noise, c.measurement_noise),
                filtered: 0.0,
                setpoint: 0.0,
                seeded: false,
            }),
            pid: Mutex::new(pid),
            output: Mutex::new(0.0),
        }
    }
}

struct Inner {
    axes: [AxisLoop; 3],
    port: Mutex<Box<dyn CoilPort + Send>>,
    scheme: ChecksumScheme,
    control_period: Duration,
    transmit_period: Duration,
    running: AtomicBool,
    observer: Mutex<Option<Box<Observer>>>,
}

/// The cage control loop.
///
/// Measurements flow in from a channel reader, three ~10 ms control ticks
/// turn filtered estimates into clamped coil outputs, and a ~100 ms
/// transmit tick seals the outputs into a command frame.
pub struct CageController {
    inner: Arc<Inner>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl CageController {
    /// Build a controller from the bench configuration and an outbound
    /// coil channel.
    pub fn new(config: &CageConfig, port: Box<dyn CoilPort + Send>) -> Self {
        Self {
            inner: Arc::new(Inner {
                axes: [
                    AxisLoop::new(config),
                    AxisLoop::new(config),
                    AxisLoop::new(config),
                ],
                port: Mutex::new(port),
                scheme: config.coil.scheme,
                control_period: Duration::from_millis(config.control.control_period_ms),
                transmit_period: Duration::from_millis(config.coil.transmit_period_ms),
                running: AtomicBool::new(false),
                observer: Mutex::new(None),
            }),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Register a consumer for per-axis estimate updates.
    pub fn set_observer(&self, observer: Box<Observer>) {
        *lock(&self.inner.observer) = Some(observer);
    }

    /// Set the target field value for one axis.
    pub fn set_setpoint(&self, axis: Axis, value: f64) {
        lock(&self.inner.axes[axis.index()].estimate).setpoint = value;
    }

    /// Current per-axis setpoints.
    pub fn setpoints(&self) -> [f64; 3] {
        std::array::from_fn(|i| lock(&self.inner.axes[i].estimate).setpoint)
    }

    /// Latest per-axis filtered estimates.
    pub fn filtered(&self) -> [f64; 3] {
        std::array::from_fn(|i| lock(&self.inner.axes[i].estimate).filtered)
    }

    /// Latest per-axis control outputs.
    pub fn outputs(&self) -> [f64; 3] {
        std::array::from_fn(|i| *lock(&self.inner.axes[i].output))
    }

    /// Feed one serial magnetometer sample.
    pub fn ingest_sample(&self, sample: FieldSample) {
        let [x, y, z] = sample.as_array();
        self.ingest([f64::from(x), f64::from(y), f64::from(z)]);
    }

    /// Feed one MDL record.
    ///
    /// Only measurement records carry field data; everything else is
    /// ignored here.
    pub fn ingest_record(&self, record: &TelemetryRecord) {
        let Some(field) = record.sensor_a_field() else {
            trace!(kind = record.kind, "ignoring non-measurement record");
            return;
        };
        self.ingest(field.map(f64::from));
    }

    fn ingest(&self, measurement: [f64; 3]) {
        for axis in Axis::ALL {
            let m = measurement[axis.index()];
            let update = {
                let mut est = lock(&self.inner.axes[axis.index()].estimate);
                if !est.seeded {
                    est.filter.reset(m, 1.0);
                    est.seeded = true;
                }
                let filtered = est.filter.update(m);
                est.filtered = filtered;
                FieldUpdate {
                    axis,
                    filtered,
                    error: est.setpoint - filtered,
                }
            };
            if let Some(observer) = lock(&self.inner.observer).as_ref() {
                observer(update);
            }
        }
    }

    /// Run one control step for an axis: PID over (setpoint, latest
    /// filtered value), storing the clamped output.
    pub fn control_cycle_axis(&self, axis: Axis) {
        self.inner.control_cycle_axis(axis);
    }

    /// Run one transmit step: seal the stored outputs into `buf` and hand
    /// the frame to the coil channel.
    pub fn transmit_cycle(&self, buf: &mut [u8; FRAME_LEN]) -> std::io::Result<()> {
        self.inner.transmit_cycle(buf)
    }

    /// Re-seed the filters and clear the PID history.
    ///
    /// Called after a channel reconnect so stale state does not bleed
    /// into the fresh measurement stream.
    pub fn reset(&self) {
        for axis_loop in &self.inner.axes {
            lock(&axis_loop.estimate).seeded = false;
            lock(&axis_loop.pid).reset();
            *lock(&axis_loop.output) = 0.0;
        }
    }

    /// Spawn the periodic control and transmit ticks.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::Relaxed) {
            return;
        }
        let mut threads = lock(&self.threads);
        for axis in Axis::ALL {
            let inner = Arc::clone(&self.inner);
            threads.push(std::thread::spawn(move || {
                run_ticks(&inner, inner.control_period, |inner| {
                    inner.control_cycle_axis(axis)
                });
            }));
        }
        let inner = Arc::clone(&self.inner);
        threads.push(std::thread::spawn(move || {
            // Single frame buffer reused for every transmission.
            let mut buf = [0u8; FRAME_LEN];
            run_ticks(&inner, inner.transmit_period, |inner| {
                if let Err(e) = inner.transmit_cycle(&mut buf) {
                    warn!("coil transmit failed: {e}");
                }
            });
        }));
        info!("cage control loop started");
    }

    /// Stop the ticks and join their threads.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Relaxed);
        for handle in lock(&self.threads).drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for CageController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn control_cycle_axis(&self, axis: Axis) {
        let axis_loop = &self.axes[axis.index()];
        let (setpoint, filtered) = {
            let est = lock(&axis_loop.estimate);
            (est.setpoint, est.filtered)
        };
        let output = lock(&axis_loop.pid).calculate(setpoint, filtered);
        *lock(&axis_loop.output) = output;
    }

    fn transmit_cycle(&self, buf: &mut [u8; FRAME_LEN]) -> std::io::Result<()> {
        let outputs: [f32; 3] = std::array::from_fn(|i| *lock(&self.axes[i].output) as f32);
        encode_command(buf, outputs, self.scheme);
        lock(&self.port).send_frame(buf)
    }
}

fn run_ticks(inner: &Arc<Inner>, period: Duration, mut tick: impl FnMut(&Inner)) {
    let mut next = Instant::now() + period;
    while inner.running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        }
        next += period;
        tick(inner.as_ref());
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hardware::coil::{crc16, FRAME_HEADER};
    use hardware::mdl::RecordKind;
    use std::io::Write;

    /// Coil port capturing every byte handed to it.
    #[derive(Clone)]
    struct CapturePort(Arc<Mutex<Vec<u8>>>);

    impl CapturePort {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let bytes = Arc::new(Mutex::new(Vec::new()));
            (Self(Arc::clone(&bytes)), bytes)
        }
    }

    impl Write for CapturePort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn test_controller() -> (CageController, Arc<Mutex<Vec<u8>>>) {
        let mut config = CageConfig::default();
        config.control.kp = 1.0;
        config.control.ki = 0.0;
        config.control.kd = 0.0;
        config.control.output_min = -50.0;
        config.control.output_max = 50.0;
        let (port, bytes) = CapturePort::new();
        (CageController::new(&config, Box::new(port)), bytes)
    }

    fn measurement_record(field: [f32; 3]) -> TelemetryRecord {
        let mut floats = [0.0f32; 14];
        floats[8..11].copy_from_slice(&field);
        TelemetryRecord {
            kind: RecordKind::Measurement as i32,
            ints: [0; 3],
            floats,
        }
    }

    #[test]
    fn test_first_sample_seeds_filter_exactly() {
        let (controller, _) = test_controller();
        controller.ingest_sample(FieldSample {
            x: 120,
            y: -340,
            z: 5,
        });
        let filtered = controller.filtered();
        assert_relative_eq!(filtered[0], 120.0);
        assert_relative_eq!(filtered[1], -340.0);
        assert_relative_eq!(filtered[2], 5.0);
    }

    #[test]
    fn test_measurement_record_feeds_primary_sensor() {
        let (controller, _) = test_controller();
        controller.ingest_record(&measurement_record([10.0, 20.0, 30.0]));
        let filtered = controller.filtered();
        assert_relative_eq!(filtered[0], 10.0);
        assert_relative_eq!(filtered[1], 20.0);
        assert_relative_eq!(filtered[2], 30.0);
    }

    #[test]
    fn test_non_measurement_record_ignored() {
        let (controller, _) = test_controller();
        let record = TelemetryRecord {
            kind: RecordKind::GpsPosition as i32,
            ints: [0; 3],
            floats: [9.9; 14],
        };
        controller.ingest_record(&record);
        assert_eq!(controller.filtered(), [0.0; 3]);
    }

    #[test]
    fn test_control_cycle_tracks_error() {
        let (controller, _) = test_controller();
        controller.set_setpoint(Axis::X, 30.0);
        controller.ingest_sample(FieldSample { x: 10, y: 0, z: 0 });
        for axis in Axis::ALL {
            controller.control_cycle_axis(axis);
        }
        let outputs = controller.outputs();
        // kp = 1: output equals the error on X, zero elsewhere.
        assert_relative_eq!(outputs[0], 20.0);
        assert_relative_eq!(outputs[1], 0.0);
        assert_relative_eq!(outputs[2], 0.0);
    }

    #[test]
    fn test_outputs_clamped_to_bounds() {
        let (controller, _) = test_controller();
        controller.set_setpoint(Axis::Z, 10_000.0);
        controller.ingest_sample(FieldSample { x: 0, y: 0, z: 0 });
        controller.control_cycle_axis(Axis::Z);
        assert_eq!(controller.outputs()[2], 50.0);
    }

    #[test]
    fn test_transmit_cycle_seals_outputs() {
        let (controller, bytes) = test_controller();
        controller.set_setpoint(Axis::X, 25.0);
        controller.ingest_sample(FieldSample { x: 0, y: 0, z: 0 });
        controller.control_cycle_axis(Axis::X);

        let mut buf = [0u8; FRAME_LEN];
        controller.transmit_cycle(&mut buf).unwrap();

        let sent = bytes.lock().unwrap().clone();
        assert_eq!(sent.len(), FRAME_LEN);
        assert_eq!(sent[0], FRAME_HEADER);
        let x = f32::from_le_bytes([sent[1], sent[2], sent[3], sent[4]]);
        assert_relative_eq!(x, 25.0);
        // Default scheme is CRC16 over bytes 0..13.
        assert_eq!(
            u16::from_le_bytes([sent[13], sent[14]]),
            crc16(&sent[..13])
        );
    }

    #[test]
    fn test_observer_receives_per_axis_updates() {
        let (controller, _) = test_controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.set_observer(Box::new(move |update| {
            sink.lock().unwrap().push(update);
        }));
        controller.set_setpoint(Axis::Y, 100.0);
        controller.ingest_sample(FieldSample { x: 0, y: 40, z: 0 });

        let updates = seen.lock().unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[1].axis, Axis::Y);
        assert_relative_eq!(updates[1].filtered, 40.0);
        assert_relative_eq!(updates[1].error, 60.0);
    }

    #[test]
    fn test_reset_reseeds_filter_and_zeroes_outputs() {
        let (controller, _) = test_controller();
        controller.set_setpoint(Axis::X, 50.0);
        controller.ingest_sample(FieldSample { x: 10, y: 0, z: 0 });
        controller.control_cycle_axis(Axis::X);
        assert!(controller.outputs()[0] > 0.0);

        controller.reset();
        assert_eq!(controller.outputs(), [0.0; 3]);

        // Next sample seeds from scratch, as after a reconnect.
        controller.ingest_sample(FieldSample { x: -77, y: 0, z: 0 });
        assert_relative_eq!(controller.filtered()[0], -77.0);
    }

    #[test]
    fn test_start_stop_transmits_frames() {
        let mut config = CageConfig::default();
        config.control.control_period_ms = 1;
        config.coil.transmit_period_ms = 2;
        let (port, bytes) = CapturePort::new();
        let controller = CageController::new(&config, Box::new(port));

        controller.start();
        std::thread::sleep(Duration::from_millis(50));
        controller.stop();

        let sent = bytes.lock().unwrap();
        assert!(sent.len() >= FRAME_LEN);
        assert_eq!(sent.len() % FRAME_LEN, 0);
        assert_eq!(sent[0], FRAME_HEADER);
    }

    #[test]
    fn test_start_is_idempotent() {
        let (controller, _) = test_controller();
        controller.start();
        controller.start();
        controller.stop();
    }
}
