//! Resolved runtime configuration for a telemetry session.
//!
//! All configuration is resolved once into an immutable [`ModeConfig`]
//! before the session starts and threaded explicitly through encoder and
//! session calls. The only post-resolution mutation is the documented
//! one-shot `table_mode` escalation performed by the session itself.

use serde::{Deserialize, Serialize};

use crate::error::{DisplayError, Result};

// =============================================================================
// Display Modes
// =============================================================================

/// What a display side (CPU or GPU) shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Temperature in degrees Celsius.
    Celsius,
    /// Temperature in degrees Fahrenheit.
    Fahrenheit,
    /// Utilization percentage.
    Usage,
    /// Power draw in watts. Shares the usage icon unless an explicit
    /// numeric mode code override is configured.
    Power,
    /// Built-in animation.
    Animation,
}

impl DisplayMode {
    /// Wire mode code for the table frame.
    pub const fn code(&self) -> u8 {
        match self {
            DisplayMode::Celsius => 19,
            DisplayMode::Fahrenheit => 35,
            DisplayMode::Usage => 76,
            DisplayMode::Power => 76,
            DisplayMode::Animation => 170,
        }
    }

    /// Parse a mode name as it appears in config files and CLI flags.
    ///
    /// Accepts the short aliases the original service used: `c`/`tempc`,
    /// `f`/`tempf`, `usage`, `power`, `anim`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "c" | "tempc" | "celsius" => Ok(DisplayMode::Celsius),
            "f" | "tempf" | "fahrenheit" => Ok(DisplayMode::Fahrenheit),
            "usage" => Ok(DisplayMode::Usage),
            "power" => Ok(DisplayMode::Power),
            "anim" | "animation" => Ok(DisplayMode::Animation),
            other => Err(DisplayError::InvalidConfig(format!(
                "Unknown display mode '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayMode::Celsius => write!(f, "Celsius"),
            DisplayMode::Fahrenheit => write!(f, "Fahrenheit"),
            DisplayMode::Usage => write!(f, "Usage"),
            DisplayMode::Power => write!(f, "Power"),
            DisplayMode::Animation => write!(f, "Animation"),
        }
    }
}

// =============================================================================
// Frame Length
// =============================================================================

/// Telemetry frame length variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameLength {
    /// 18-byte shortened frame (header + telemetry section only).
    Short,
    /// 64-byte full HID report, telemetry section zero-padded.
    Full,
}

impl FrameLength {
    pub const fn bytes(&self) -> usize {
        match self {
            FrameLength::Short => 18,
            FrameLength::Full => 64,
        }
    }

    /// Parse from a configured byte count. Only 18 and 64 are valid.
    pub fn from_bytes(len: usize) -> Result<Self> {
        match len {
            18 => Ok(FrameLength::Short),
            64 => Ok(FrameLength::Full),
            other => Err(DisplayError::InvalidConfig(format!(
                "Telemetry frame length must be 18 or 64, got {}",
                other
            ))),
        }
    }
}

// =============================================================================
// GPU Selection Mode
// =============================================================================

/// Preference applied when scoring GPU hardware units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuSelect {
    /// Prefer discrete GPUs (NVIDIA/AMD).
    Discrete,
    /// Prefer integrated GPUs.
    Integrated,
    /// Prefer whichever unit currently reports the highest core load.
    MaxLoad,
}

impl GpuSelect {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "discrete" => Ok(GpuSelect::Discrete),
            "integrated" => Ok(GpuSelect::Integrated),
            "maxload" => Ok(GpuSelect::MaxLoad),
            other => Err(DisplayError::InvalidConfig(format!(
                "Unknown GPU selection mode '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Mode Config
// =============================================================================

/// Default CPU power ceiling in watts for bar scaling.
pub const DEFAULT_CPU_POWER_CEILING_W: f32 = 200.0;

/// Default GPU power ceiling in watts for bar scaling.
pub const DEFAULT_GPU_POWER_CEILING_W: f32 = 400.0;

/// Default tick interval in milliseconds.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 1000;

/// Valid tick interval range in milliseconds.
pub const UPDATE_INTERVAL_RANGE_MS: (u64, u64) = (200, 10_000);

/// Default delay before the one-shot table-mode escalation, in seconds.
pub const DEFAULT_AUTO_TABLE_SECS: u64 = 8;

/// Fully resolved session configuration.
///
/// Built once from the config file plus CLI overrides; immutable for the
/// session lifetime apart from the one-shot `table_mode` escalation.
#[derive(Debug, Clone)]
pub struct ModeConfig {
    /// CPU side display mode.
    pub cpu_mode: DisplayMode,
    /// GPU side display mode. `None` mirrors the resolved CPU mode code.
    pub gpu_mode: Option<DisplayMode>,
    /// Explicit numeric mode code for the CPU side; always wins.
    pub cpu_mode_code: Option<u8>,
    /// Explicit numeric mode code for the GPU side; always wins.
    pub gpu_mode_code: Option<u8>,

    /// CPU power bar ceiling in watts.
    pub cpu_power_ceiling_w: f32,
    /// GPU power bar ceiling in watts.
    pub gpu_power_ceiling_w: f32,

    /// Stream 11-byte table frames instead of telemetry frames.
    pub table_mode: bool,
    /// Stream both a telemetry frame and a table frame each tick.
    pub dual_mode: bool,
    /// For unclassified devices, emit both series layouts for diagnosis.
    pub test_both_mode: bool,

    /// Telemetry frame length (18 or 64 bytes).
    pub frame_length: FrameLength,
    /// Multi-byte wire fields in big-endian order.
    pub big_endian: bool,

    /// USB vendor id override.
    pub vendor_id: Option<u16>,
    /// USB product id override, attempted before the candidate list.
    pub product_id: Option<u16>,

    /// GPU hardware unit index override.
    pub gpu_index: Option<usize>,
    /// GPU vendor substring override (case-insensitive).
    pub gpu_vendor: Option<String>,
    /// GPU unit scoring preference.
    pub gpu_select: Option<GpuSelect>,
    /// GPU temperature sensor name override.
    pub gpu_temp_sensor: Option<String>,
    /// GPU load sensor name override.
    pub gpu_load_sensor: Option<String>,

    /// Tick interval in milliseconds, clamped to 200-10000.
    pub update_interval_ms: u64,
    /// Seconds of streaming before the CH table-mode escalation.
    pub auto_table_secs: u64,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            cpu_mode: DisplayMode::Celsius,
            gpu_mode: None,
            cpu_mode_code: None,
            gpu_mode_code: None,
            cpu_power_ceiling_w: DEFAULT_CPU_POWER_CEILING_W,
            gpu_power_ceiling_w: DEFAULT_GPU_POWER_CEILING_W,
            table_mode: false,
            dual_mode: false,
            test_both_mode: false,
            frame_length: FrameLength::Full,
            big_endian: true,
            vendor_id: None,
            product_id: None,
            gpu_index: None,
            gpu_vendor: None,
            gpu_select: None,
            gpu_temp_sensor: None,
            gpu_load_sensor: None,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            auto_table_secs: DEFAULT_AUTO_TABLE_SECS,
        }
    }
}

impl ModeConfig {
    /// Clamp the tick interval into the supported range.
    pub fn clamped_interval_ms(&self) -> u64 {
        let (min, max) = UPDATE_INTERVAL_RANGE_MS;
        self.update_interval_ms.clamp(min, max)
    }

    /// Resolved CPU mode code for the table frame.
    pub fn resolved_cpu_code(&self) -> u8 {
        self.cpu_mode_code.unwrap_or_else(|| self.cpu_mode.code())
    }

    /// Resolved GPU mode code; mirrors the CPU code when unset.
    pub fn resolved_gpu_code(&self) -> u8 {
        if let Some(code) = self.gpu_mode_code {
            return code;
        }
        match self.gpu_mode {
            Some(mode) => mode.code(),
            None => self.resolved_cpu_code(),
        }
    }

    /// Effective GPU display mode; mirrors the CPU mode when unset.
    pub fn effective_gpu_mode(&self) -> DisplayMode {
        self.gpu_mode.unwrap_or(self.cpu_mode)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_codes() {
        assert_eq!(DisplayMode::Celsius.code(), 19);
        assert_eq!(DisplayMode::Fahrenheit.code(), 35);
        assert_eq!(DisplayMode::Usage.code(), 76);
        assert_eq!(DisplayMode::Power.code(), 76);
        assert_eq!(DisplayMode::Animation.code(), 170);
    }

    #[test]
    fn test_mode_parsing_aliases() {
        assert_eq!(DisplayMode::parse("c").unwrap(), DisplayMode::Celsius);
        assert_eq!(DisplayMode::parse("TempF").unwrap(), DisplayMode::Fahrenheit);
        assert_eq!(DisplayMode::parse("usage").unwrap(), DisplayMode::Usage);
        assert_eq!(DisplayMode::parse("anim").unwrap(), DisplayMode::Animation);
        assert!(DisplayMode::parse("bogus").is_err());
    }

    #[test]
    fn test_frame_length() {
        assert_eq!(FrameLength::Short.bytes(), 18);
        assert_eq!(FrameLength::Full.bytes(), 64);
        assert_eq!(FrameLength::from_bytes(18).unwrap(), FrameLength::Short);
        assert_eq!(FrameLength::from_bytes(64).unwrap(), FrameLength::Full);
        assert!(FrameLength::from_bytes(32).is_err());
    }

    #[test]
    fn test_interval_clamping() {
        let mut config = ModeConfig {
            update_interval_ms: 50,
            ..Default::default()
        };
        assert_eq!(config.clamped_interval_ms(), 200);
        config.update_interval_ms = 60_000;
        assert_eq!(config.clamped_interval_ms(), 10_000);
        config.update_interval_ms = 1500;
        assert_eq!(config.clamped_interval_ms(), 1500);
    }

    #[test]
    fn test_gpu_code_mirrors_cpu() {
        let config = ModeConfig {
            cpu_mode: DisplayMode::Usage,
            ..Default::default()
        };
        assert_eq!(config.resolved_gpu_code(), 76);

        let config = ModeConfig {
            cpu_mode: DisplayMode::Celsius,
            gpu_mode: Some(DisplayMode::Fahrenheit),
            ..Default::default()
        };
        assert_eq!(config.resolved_gpu_code(), 35);
    }

    #[test]
    fn test_explicit_code_overrides_win() {
        let config = ModeConfig {
            cpu_mode: DisplayMode::Celsius,
            cpu_mode_code: Some(77),
            gpu_mode_code: Some(78),
            ..Default::default()
        };
        assert_eq!(config.resolved_cpu_code(), 77);
        assert_eq!(config.resolved_gpu_code(), 78);
    }
}
