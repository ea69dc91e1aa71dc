//! Telemetry session state machine.
//!
//! Owns the resolved device, the mode configuration and the cached sensor
//! selection, and drives two periodic tasks for the session lifetime:
//!
//! - the **tick task**: sample -> select -> encode -> write, at the
//!   configured interval;
//! - the **diagnostic read task**: polls the device for unsolicited input
//!   reports every 500 ms, purely observational.
//!
//! No failure inside a tick propagates past the tick boundary: a failed
//! write or a missing sensor value degrades that tick to skip-and-log and
//! the session self-heals on the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::{DisplayMode, ModeConfig};
use crate::device::locator::{self, Device};
use crate::device::transport::{HidHandle, HidTransport};
use crate::protocol::{Series, encode_table_frame, encode_telemetry_frame, init_packets};
use crate::sensors::{GpuSelection, HardwareProvider, TelemetrySample, select_cpu, select_gpu};

// =============================================================================
// Constants
// =============================================================================

/// Diagnostic read task cadence.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Per-read timeout passed to the transport by the diagnostic task.
const READ_TIMEOUT_MS: i32 = 100;

/// Bounded join timeout for the tick task on shutdown.
const TICK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded join timeout for the diagnostic read task on shutdown.
const READ_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Slice used when sleeping so the cancellation flag stays responsive.
const STOP_POLL_SLICE: Duration = Duration::from_millis(50);

// =============================================================================
// Session Policy (pure)
// =============================================================================

/// What the tick emits, by fixed priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Telemetry frame plus table frame.
    Dual,
    /// Table frame only.
    Table,
    /// One LD-layout and one CH-layout telemetry frame, for diagnosing
    /// unclassified devices.
    TestBoth,
    /// Single telemetry frame for the detected series.
    Single,
}

/// Emission strategy priority: dual > table > test-both (Unknown series
/// only) > single.
pub fn emission_strategy(
    table_mode: bool,
    dual_mode: bool,
    test_both_mode: bool,
    series: Series,
) -> Emission {
    if dual_mode {
        Emission::Dual
    } else if table_mode {
        Emission::Table
    } else if series == Series::Unknown && test_both_mode {
        Emission::TestBoth
    } else {
        Emission::Single
    }
}

/// One-shot table-mode escalation: CH series, table mode still off, past
/// the configured delay, and not already fired.
pub fn should_escalate(
    series: Series,
    table_mode: bool,
    escalated: bool,
    elapsed: Duration,
    delay: Duration,
) -> bool {
    series == Series::Ch && !table_mode && !escalated && elapsed > delay
}

// =============================================================================
// Telemetry Session
// =============================================================================

/// Session lifecycle state, tracked for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Detecting,
    Initializing,
    Streaming,
    Stopping,
    Stopped,
}

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
    join_timeout: Duration,
}

/// A running telemetry session.
///
/// Constructed by [`TelemetrySession::start`]; stopped cooperatively by
/// [`TelemetrySession::stop`].
pub struct TelemetrySession {
    stop: Arc<AtomicBool>,
    workers: Vec<Worker>,
}

impl TelemetrySession {
    /// Resolve the device, perform the init handshake and start the tick
    /// and diagnostic tasks.
    ///
    /// Returns `None` when no device is present — a normal outcome that
    /// leaves the process running without a streaming session.
    pub fn start(
        transport: &dyn HidTransport,
        provider: Box<dyn HardwareProvider>,
        config: ModeConfig,
    ) -> Option<Self> {
        info!("Session state: {:?}", SessionState::Detecting);
        let device = locator::resolve(transport, &config)?;

        info!("Session state: {:?}", SessionState::Initializing);
        initialize_device(&device, &config);

        info!("Session state: {:?}", SessionState::Streaming);
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::new();

        let series = device.series;
        let handle = device.handle.clone();
        let tick_stop = stop.clone();
        let (tick_done_tx, tick_done_rx) = mpsc::channel();
        let tick_config = config.clone();
        let tick_handle = thread::spawn(move || {
            tick_loop(handle, series, tick_config, provider, tick_stop);
            let _ = tick_done_tx.send(());
        });
        workers.push(Worker {
            name: "tick",
            handle: tick_handle,
            done: tick_done_rx,
            join_timeout: TICK_JOIN_TIMEOUT,
        });

        if let Some(handle) = device.handle.clone() {
            let read_stop = stop.clone();
            let (read_done_tx, read_done_rx) = mpsc::channel();
            let read_handle = thread::spawn(move || {
                read_loop(handle, read_stop);
                let _ = read_done_tx.send(());
            });
            workers.push(Worker {
                name: "read",
                handle: read_handle,
                done: read_done_rx,
                join_timeout: READ_JOIN_TIMEOUT,
            });
        }

        Some(Self { stop, workers })
    }

    /// Signal cancellation and join both tasks with bounded timeouts.
    ///
    /// A task exceeding its timeout is logged as an anomaly and abandoned;
    /// shutdown never blocks indefinitely and one slow task never delays
    /// the other.
    pub fn stop(self) {
        info!("Session state: {:?}", SessionState::Stopping);
        self.stop.store(true, Ordering::SeqCst);

        for worker in self.workers {
            match worker.done.recv_timeout(worker.join_timeout) {
                Ok(()) => {
                    let _ = worker.handle.join();
                }
                Err(_) => {
                    warn!(
                        "{} task did not stop within {:?}; abandoning it",
                        worker.name, worker.join_timeout
                    );
                }
            }
        }

        info!("Session state: {:?}", SessionState::Stopped);
    }
}

/// Send the series/table-appropriate init sequence. Best-effort: a missing
/// handle or failed write is logged and startup continues.
fn initialize_device(device: &Device, config: &ModeConfig) {
    let Some(handle) = &device.handle else {
        warn!("Device not open; skipping init handshake");
        return;
    };

    for packet in init_packets(device.series, config.table_mode) {
        dump_packet("init", packet);
        if let Err(e) = handle.write_report(packet) {
            warn!("Init packet write failed: {}", e);
        }
    }
}

// =============================================================================
// Tick Task
// =============================================================================

fn tick_loop(
    handle: Option<Arc<dyn HidHandle>>,
    series: Series,
    config: ModeConfig,
    mut provider: Box<dyn HardwareProvider>,
    stop: Arc<AtomicBool>,
) {
    let interval = Duration::from_millis(config.clamped_interval_ms());
    let started = Instant::now();
    let escalation_delay = Duration::from_secs(config.auto_table_secs);

    // Write-once-then-read; re-selection only happens while it is empty.
    let selection: Mutex<GpuSelection> = Mutex::new(GpuSelection::default());

    let mut table_mode = config.table_mode;
    let mut escalated = false;

    while !stop.load(Ordering::SeqCst) {
        if should_escalate(series, table_mode, escalated, started.elapsed(), escalation_delay) {
            table_mode = true;
            escalated = true;
            info!(
                "CH device still in telemetry mode after {:?}; escalating to table mode",
                escalation_delay
            );
        }

        run_tick(handle.as_deref(), series, &config, table_mode, &mut provider, &selection);

        sleep_with_stop(&stop, interval);
    }
}

/// One tick: refresh sensors, build the sample, emit frames. Every failure
/// path degrades to skip-and-log.
fn run_tick(
    handle: Option<&dyn HidHandle>,
    series: Series,
    config: &ModeConfig,
    table_mode: bool,
    provider: &mut Box<dyn HardwareProvider>,
    selection: &Mutex<GpuSelection>,
) {
    provider.update();
    let units = provider.units();

    let cpu = select_cpu(units);

    let gpu = {
        let mut guard = match selection.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("GPU selection lock poisoned: {}", e);
                return;
            }
        };
        if guard.is_empty() {
            let fresh = select_gpu(units, config);
            if !fresh.is_empty() {
                info!("GPU selection: {:?}", fresh);
            }
            *guard = fresh;
        }
        *guard
    };
    let (gpu_temp, gpu_load, gpu_power) = gpu.read(units);

    let sample = TelemetrySample {
        cpu_temp_c: cpu.temp_c,
        cpu_load_pct: cpu.load_pct.map(to_pct),
        cpu_power_w: cpu.power_w,
        gpu_temp_c: gpu_temp,
        gpu_load_pct: gpu_load.map(to_pct),
        gpu_power_w: gpu_power,
    };

    if !sample.has_mandatory_cpu() {
        debug!("Incomplete CPU sample ({:?}); skipping tick", sample);
        return;
    }

    emit(handle, series, config, table_mode, &sample);
}

fn to_pct(value: f32) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn emit(
    handle: Option<&dyn HidHandle>,
    series: Series,
    config: &ModeConfig,
    table_mode: bool,
    sample: &TelemetrySample,
) {
    let power = sample.cpu_power_w.unwrap_or(0.0).round().clamp(0.0, 65535.0) as u16;
    let temp = sample.cpu_temp_c.unwrap_or(0.0);
    let load = sample.cpu_load_pct.unwrap_or(0);
    let fahrenheit = config.cpu_mode == DisplayMode::Fahrenheit;

    let telemetry = |s: Series| {
        encode_telemetry_frame(
            s,
            power,
            temp,
            fahrenheit,
            load,
            config.frame_length,
            config.big_endian,
        )
    };

    let frames: Vec<Vec<u8>> = match emission_strategy(
        table_mode,
        config.dual_mode,
        config.test_both_mode,
        series,
    ) {
        Emission::Dual => vec![
            telemetry(series),
            encode_table_frame(config, sample).to_vec(),
        ],
        Emission::Table => vec![encode_table_frame(config, sample).to_vec()],
        Emission::TestBoth => vec![telemetry(Series::Ld), telemetry(Series::Ch)],
        Emission::Single => vec![telemetry(series)],
    };

    let Some(handle) = handle else {
        debug!("Device not open; dropping {} frame(s)", frames.len());
        return;
    };

    for frame in frames {
        dump_packet("send", &frame);
        if let Err(e) = handle.write_report(&frame) {
            // Transient: skip this tick, next tick retries naturally.
            warn!("Frame write failed: {}", e);
        }
    }
}

// =============================================================================
// Diagnostic Read Task
// =============================================================================

/// Poll the device for unsolicited input reports. Purely observational:
/// reports are hex-dumped at debug level and never feed back into encoding.
fn read_loop(handle: Arc<dyn HidHandle>, stop: Arc<AtomicBool>) {
    let mut buf = [0u8; 64];
    while !stop.load(Ordering::SeqCst) {
        match handle.read_report(&mut buf, READ_TIMEOUT_MS) {
            Ok(n) if n > 0 => dump_packet("recv", &buf[..n]),
            Ok(_) => {}
            Err(e) => debug!("Diagnostic read failed: {}", e),
        }
        sleep_with_stop(&stop, READ_POLL_INTERVAL);
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Sleep in slices so cancellation is observed promptly.
fn sleep_with_stop(stop: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(STOP_POLL_SLICE));
    }
}

/// Hex-dump a packet at debug level.
fn dump_packet(direction: &str, bytes: &[u8]) {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    debug!(target: "packet", "{} [{}] {}", direction, bytes.len(), hex.join(" "));
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameLength;
    use crate::device::transport::{DeviceInfo, HidTransport};
    use crate::error::Result;
    use crate::sensors::{HardwareKind, HardwareUnit, SensorKind, SensorReading};
    use std::ffi::CString;

    #[test]
    fn test_emission_priority() {
        // dual beats everything
        assert_eq!(
            emission_strategy(true, true, true, Series::Unknown),
            Emission::Dual
        );
        // table beats test-both and single
        assert_eq!(
            emission_strategy(true, false, true, Series::Unknown),
            Emission::Table
        );
        // test-both requires Unknown series
        assert_eq!(
            emission_strategy(false, false, true, Series::Unknown),
            Emission::TestBoth
        );
        assert_eq!(
            emission_strategy(false, false, true, Series::Ch),
            Emission::Single
        );
        assert_eq!(
            emission_strategy(false, false, false, Series::Ld),
            Emission::Single
        );
    }

    #[test]
    fn test_escalation_fires_once_for_ch() {
        let delay = Duration::from_secs(8);
        assert!(!should_escalate(
            Series::Ch,
            false,
            false,
            Duration::from_secs(7),
            delay
        ));
        assert!(should_escalate(
            Series::Ch,
            false,
            false,
            Duration::from_secs(9),
            delay
        ));
        // Never re-fires once escalated.
        assert!(!should_escalate(
            Series::Ch,
            true,
            true,
            Duration::from_secs(100),
            delay
        ));
        // Configured table mode suppresses it.
        assert!(!should_escalate(
            Series::Ch,
            true,
            false,
            Duration::from_secs(100),
            delay
        ));
    }

    #[test]
    fn test_escalation_never_fires_for_ld_or_unknown() {
        let delay = Duration::from_secs(8);
        for series in [Series::Ld, Series::Unknown] {
            assert!(!should_escalate(
                series,
                false,
                false,
                Duration::from_secs(3600),
                delay
            ));
        }
    }

    // -------------------------------------------------------------------------
    // Thread-level smoke test on a recording transport
    // -------------------------------------------------------------------------

    #[derive(Clone)]
    struct RecordingHandle {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl HidHandle for RecordingHandle {
        fn write_report(&self, data: &[u8]) -> Result<usize> {
            self.writes.lock().unwrap().push(data.to_vec());
            Ok(data.len())
        }
        fn read_report(&self, _buf: &mut [u8], _timeout_ms: i32) -> Result<usize> {
            Ok(0)
        }
    }

    struct RecordingTransport {
        product_id: u16,
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl HidTransport for RecordingTransport {
        fn enumerate(&self, vendor_id: u16) -> Vec<DeviceInfo> {
            vec![DeviceInfo {
                vendor_id,
                product_id: self.product_id,
                path: CString::new("fake").unwrap(),
            }]
        }
        fn open(&self, _info: &DeviceInfo) -> Result<Box<dyn HidHandle>> {
            Ok(Box::new(RecordingHandle {
                writes: self.writes.clone(),
            }))
        }
    }

    struct FixedProvider {
        units: Vec<HardwareUnit>,
    }

    impl HardwareProvider for FixedProvider {
        fn update(&mut self) {}
        fn units(&self) -> &[HardwareUnit] {
            &self.units
        }
    }

    fn full_cpu_unit() -> HardwareUnit {
        let mut unit = HardwareUnit::new(HardwareKind::Cpu, "CPU");
        unit.sensors = vec![
            SensorReading::new(SensorKind::Power, "CPU Package", Some(88.0)),
            SensorReading::new(SensorKind::Temperature, "Core (Tctl)", Some(61.0)),
            SensorReading::new(SensorKind::Load, "CPU Total", Some(37.0)),
        ];
        unit
    }

    #[test]
    fn test_session_streams_telemetry_frames() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport {
            product_id: 0x000A,
            writes: writes.clone(),
        };
        let provider = Box::new(FixedProvider {
            units: vec![full_cpu_unit()],
        });
        let config = ModeConfig {
            update_interval_ms: 200,
            frame_length: FrameLength::Full,
            ..Default::default()
        };

        let session = TelemetrySession::start(&transport, provider, config).unwrap();
        thread::sleep(Duration::from_millis(700));
        session.stop();

        let written = writes.lock().unwrap();
        // Init handshake first.
        assert_eq!(written[0], vec![16, 104, 1, 1, 2, 3, 1, 112, 22]);
        assert_eq!(written[1], vec![16, 104, 1, 1, 2, 2, 0, 110, 22]);
        // Then telemetry frames with the LD header.
        let frames: Vec<_> = written[2..].iter().collect();
        assert!(!frames.is_empty());
        for frame in frames {
            assert_eq!(frame.len(), 64);
            assert_eq!(&frame[0..8], &[16, 104, 1, 1, 11, 1, 2, 5]);
            assert_eq!(frame[17], 22);
        }
    }

    #[test]
    fn test_session_skips_on_incomplete_cpu_triple() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport {
            product_id: 0x000A,
            writes: writes.clone(),
        };
        // No power sensor: the mandatory triple is incomplete.
        let mut unit = HardwareUnit::new(HardwareKind::Cpu, "CPU");
        unit.sensors = vec![
            SensorReading::new(SensorKind::Temperature, "Core (Tctl)", Some(61.0)),
            SensorReading::new(SensorKind::Load, "CPU Total", Some(37.0)),
        ];
        let provider = Box::new(FixedProvider { units: vec![unit] });
        let config = ModeConfig {
            update_interval_ms: 200,
            ..Default::default()
        };

        let session = TelemetrySession::start(&transport, provider, config).unwrap();
        thread::sleep(Duration::from_millis(500));
        session.stop();

        // Only the two init packets, no telemetry frames.
        assert_eq!(writes.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_session_not_started_without_device() {
        struct EmptyTransport;
        impl HidTransport for EmptyTransport {
            fn enumerate(&self, _vendor_id: u16) -> Vec<DeviceInfo> {
                Vec::new()
            }
            fn open(&self, _info: &DeviceInfo) -> Result<Box<dyn HidHandle>> {
                unreachable!("nothing to open")
            }
        }
        let provider = Box::new(FixedProvider {
            units: vec![full_cpu_unit()],
        });
        assert!(TelemetrySession::start(&EmptyTransport, provider, ModeConfig::default()).is_none());
    }

    #[test]
    fn test_table_mode_session_sends_table_init_and_frames() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport {
            product_id: 0x0007, // CH series
            writes: writes.clone(),
        };
        let provider = Box::new(FixedProvider {
            units: vec![full_cpu_unit()],
        });
        let config = ModeConfig {
            table_mode: true,
            update_interval_ms: 200,
            ..Default::default()
        };

        let session = TelemetrySession::start(&transport, provider, config).unwrap();
        thread::sleep(Duration::from_millis(500));
        session.stop();

        let written = writes.lock().unwrap();
        assert_eq!(written[0], vec![16, 170, 5, 1, 1, 1, 170, 5, 1, 1, 1]);
        assert!(written.len() > 1);
        for frame in &written[1..] {
            assert_eq!(frame.len(), 11);
            assert_eq!(frame[0], 16);
            // Digits within range.
            for &d in frame[3..6].iter().chain(frame[8..11].iter()) {
                assert!(d <= 9);
            }
            // Bars within range.
            assert!((1..=10).contains(&frame[2]));
            assert!((1..=10).contains(&frame[7]));
        }
    }
}
