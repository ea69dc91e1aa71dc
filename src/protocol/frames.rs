//! Packet builders for Deepcool display devices.
//!
//! Protocol reverse-engineered from USB captures of the two known device
//! series. Two frame shapes exist: the telemetry frame (18 or 64 bytes,
//! power/temperature/utilization with a checksum) and the table frame
//! (exactly 11 bytes, driving a seven-segment-style numeric + bar display).
//!
//! Everything in this module is pure and stateless; the session decides
//! what to encode, this module decides how.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::config::{DisplayMode, FrameLength, ModeConfig};
use crate::sensors::TelemetrySample;

// =============================================================================
// Constants
// =============================================================================

/// Deepcool USB vendor id.
pub const DEEPCOOL_VID: u16 = 0x3633;

/// Candidate product ids, in fixed detection priority order.
pub const CANDIDATE_PRODUCT_IDS: [u16; 5] = [0x0007, 0x000A, 0x000B, 0x000C, 0x0010];

/// Table frame length in bytes.
pub const TABLE_FRAME_LENGTH: usize = 11;

/// Telemetry frame terminator byte.
pub const FRAME_TERMINATOR: u8 = 22;

/// LD-series telemetry frame header.
const HEADER_LD: [u8; 8] = [16, 104, 1, 1, 11, 1, 2, 5];

/// CH-series (Morpheus) telemetry frame header.
const HEADER_CH: [u8; 8] = [16, 104, 1, 1, 12, 1, 2, 5];

/// Default init sequence, two control packets (LD, and CH without table mode).
pub const INIT_SEQUENCE_DEFAULT: [[u8; 9]; 2] = [
    [16, 104, 1, 1, 2, 3, 1, 112, 22],
    [16, 104, 1, 1, 2, 2, 0, 110, 22],
];

/// CH-series init packet when table mode is active.
pub const INIT_SEQUENCE_CH_TABLE: [u8; 11] = [16, 170, 5, 1, 1, 1, 170, 5, 1, 1, 1];

// =============================================================================
// Device Series
// =============================================================================

/// Device protocol family, inferred from the USB product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    /// Unclassified product id. Telemetry frames fall back to the legacy
    /// LD layout.
    Unknown,
    /// LD legacy series.
    Ld,
    /// CH series (Morpheus).
    Ch,
}

impl Series {
    /// Classify a product id into a series.
    pub const fn from_product_id(pid: u16) -> Self {
        match pid {
            0x000A => Series::Ld,
            0x000B | 0x0007 => Series::Ch,
            _ => Series::Unknown,
        }
    }

    /// Telemetry frame header for this series.
    const fn header(&self) -> [u8; 8] {
        match self {
            Series::Ch => HEADER_CH,
            // Unclassified ids use the legacy layout.
            Series::Ld | Series::Unknown => HEADER_LD,
        }
    }
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Series::Unknown => write!(f, "Unknown"),
            Series::Ld => write!(f, "LD"),
            Series::Ch => write!(f, "CH"),
        }
    }
}

// =============================================================================
// Init Sequences
// =============================================================================

/// Init packets to send once at session start, chosen by series and
/// whether table mode is active.
pub fn init_packets(series: Series, table_mode: bool) -> Vec<&'static [u8]> {
    if series == Series::Ch && table_mode {
        vec![&INIT_SEQUENCE_CH_TABLE]
    } else {
        INIT_SEQUENCE_DEFAULT.iter().map(|p| p.as_slice()).collect()
    }
}

// =============================================================================
// Telemetry Frame
// =============================================================================

/// Build a telemetry frame.
///
/// Layout (0-based indices):
/// - `[0..8]`   series header
/// - `[8..10]`  power in watts, u16 in the configured byte order
/// - `[10]`     temperature unit (0 = Celsius, 1 = Fahrenheit)
/// - `[11..15]` temperature, IEEE-754 f32 in the configured byte order
/// - `[15]`     utilization 0-100
/// - `[16]`     checksum = sum(bytes[1..=15]) % 256
/// - `[17]`     terminator (22)
/// - `[18..64]` zero padding when the frame length is 64
pub fn encode_telemetry_frame(
    series: Series,
    power_w: u16,
    temp_c: f32,
    fahrenheit: bool,
    load_pct: u8,
    frame_length: FrameLength,
    big_endian: bool,
) -> Vec<u8> {
    let mut frame = vec![0u8; frame_length.bytes()];
    frame[0..8].copy_from_slice(&series.header());

    if big_endian {
        BigEndian::write_u16(&mut frame[8..10], power_w);
    } else {
        LittleEndian::write_u16(&mut frame[8..10], power_w);
    }

    frame[10] = if fahrenheit { 1 } else { 0 };

    if big_endian {
        BigEndian::write_f32(&mut frame[11..15], temp_c);
    } else {
        LittleEndian::write_f32(&mut frame[11..15], temp_c);
    }

    frame[15] = load_pct.min(100);
    frame[16] = checksum(&frame[1..=15]);
    frame[17] = FRAME_TERMINATOR;

    frame
}

/// Telemetry frame checksum over bytes [1..=15].
fn checksum(payload: &[u8]) -> u8 {
    (payload.iter().map(|&b| b as u16).sum::<u16>() % 256) as u8
}

// =============================================================================
// Table Frame
// =============================================================================

/// Build the 11-byte table frame.
///
/// Layout: `[0]`=16 (frame id), `[1]`=cpu mode code, `[2]`=cpu bar (1-10),
/// `[3..6]`=cpu digits (hundreds, tens, ones), `[6]`=gpu mode code,
/// `[7]`=gpu bar, `[8..11]`=gpu digits.
///
/// When the sample carries no GPU telemetry at all, the GPU side mirrors
/// the CPU mode, value and bar exactly.
pub fn encode_table_frame(config: &ModeConfig, sample: &TelemetrySample) -> [u8; TABLE_FRAME_LENGTH] {
    let cpu_temp = sample.cpu_temp_c.unwrap_or(0.0);
    let cpu_load = sample.cpu_load_pct.unwrap_or(0);

    let cpu_code = config.resolved_cpu_code();
    let (cpu_value, cpu_bar) = side_value_and_bar(
        config.cpu_mode,
        cpu_temp,
        cpu_load,
        sample.cpu_power_w,
        config.cpu_power_ceiling_w,
    );

    let has_gpu_telemetry = sample.gpu_temp_c.is_some()
        || sample.gpu_load_pct.is_some()
        || sample.gpu_power_w.is_some();

    let (gpu_code, gpu_value, gpu_bar) = if has_gpu_telemetry {
        // Per-field CPU fallback for partial GPU telemetry.
        let gpu_temp = sample.gpu_temp_c.unwrap_or(cpu_temp);
        let gpu_load = sample.gpu_load_pct.unwrap_or(cpu_load);
        let (value, bar) = side_value_and_bar(
            config.effective_gpu_mode(),
            gpu_temp,
            gpu_load,
            sample.gpu_power_w,
            config.gpu_power_ceiling_w,
        );
        (config.resolved_gpu_code(), value, bar)
    } else {
        (cpu_code, cpu_value, cpu_bar)
    };

    let cpu_digits = digits(cpu_value);
    let gpu_digits = digits(gpu_value);

    [
        16,
        cpu_code,
        cpu_bar,
        cpu_digits[0],
        cpu_digits[1],
        cpu_digits[2],
        gpu_code,
        gpu_bar,
        gpu_digits[0],
        gpu_digits[1],
        gpu_digits[2],
    ]
}

/// Displayed value and bar level for one display side.
fn side_value_and_bar(
    mode: DisplayMode,
    temp_c: f32,
    load_pct: u8,
    power_w: Option<f32>,
    ceiling_w: f32,
) -> (i32, u8) {
    match mode {
        DisplayMode::Power if power_w.is_some() => {
            let power = power_w.unwrap_or(0.0);
            let ratio = (power / ceiling_w.max(1.0)).min(1.0);
            (power.round() as i32, bar_level(ratio))
        }
        DisplayMode::Usage => {
            let ratio = load_pct.min(100) as f32 / 100.0;
            (load_pct as i32, bar_level(ratio))
        }
        DisplayMode::Fahrenheit => {
            // Load percentage is the bar proxy in temperature modes.
            let ratio = load_pct.min(100) as f32 / 100.0;
            ((temp_c * 9.0 / 5.0 + 32.0).round() as i32, bar_level(ratio))
        }
        // Celsius, Animation, and Power without a power reading all show
        // the temperature.
        _ => {
            let ratio = load_pct.min(100) as f32 / 100.0;
            (temp_c.round() as i32, bar_level(ratio))
        }
    }
}

/// Scale a 0.0-1.0 ratio into the 1-10 bar range.
fn bar_level(ratio: f32) -> u8 {
    ((ratio * 10.0).ceil() as i32).clamp(1, 10) as u8
}

/// Decompose a displayed value into hundreds/tens/ones digits.
///
/// The value is clamped to [0, 999] and each digit to [0, 9]; zero is a
/// legitimate displayed digit, not a placeholder.
fn digits(value: i32) -> [u8; 3] {
    let v = value.clamp(0, 999);
    [(v / 100) as u8, ((v / 10) % 10) as u8, (v % 10) as u8]
}

// =============================================================================
// Tests
// =============================================================================
