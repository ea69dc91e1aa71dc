//! Config file persistence.
//!
//! Stores driver settings as JSON in the platform config directory and
//! resolves them into an immutable [`ModeConfig`] at session start.
//! Cross-platform: uses appropriate config directories for each OS.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{
    DEFAULT_AUTO_TABLE_SECS, DEFAULT_CPU_POWER_CEILING_W, DEFAULT_GPU_POWER_CEILING_W,
    DEFAULT_UPDATE_INTERVAL_MS, DisplayMode, FrameLength, GpuSelect, ModeConfig,
};
use crate::error::{DisplayError, Result};

// =============================================================================
// Config Path
// =============================================================================

const APP_NAME: &str = "deepcool-display";
const CONFIG_FILE: &str = "config.json";

/// Get the configuration directory path.
/// - Linux: ~/.config/deepcool-display/
/// - Windows: %APPDATA%\deepcool-display\
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .ok_or_else(|| DisplayError::InvalidConfig("Could not find config directory".into()))
}

/// Get the full path to the config file.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

// =============================================================================
// Stored Config
// =============================================================================

/// On-disk configuration. All fields optional with defaults so existing
/// files keep working when new keys appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// CPU display mode: "c", "f", "usage", "power", "anim".
    #[serde(default = "default_cpu_mode")]
    pub cpu_mode: String,

    /// GPU display mode; empty mirrors the CPU mode.
    #[serde(default)]
    pub gpu_mode: Option<String>,

    /// Explicit numeric mode code overrides.
    #[serde(default)]
    pub cpu_mode_code: Option<u8>,
    #[serde(default)]
    pub gpu_mode_code: Option<u8>,

    /// Power bar ceilings in watts.
    #[serde(default = "default_cpu_power_max")]
    pub cpu_power_max: f32,
    #[serde(default = "default_gpu_power_max")]
    pub gpu_power_max: f32,

    #[serde(default)]
    pub table_mode: bool,
    #[serde(default)]
    pub dual_mode: bool,
    #[serde(default)]
    pub test_both_mode: bool,

    /// Telemetry frame length in bytes: 18 or 64.
    #[serde(default = "default_packet_len")]
    pub packet_len: usize,

    /// Byte order for multi-byte wire fields: "be" or "le".
    #[serde(default = "default_endian")]
    pub endian: String,

    /// USB id overrides.
    #[serde(default)]
    pub vendor_id: Option<u16>,
    #[serde(default)]
    pub product_id: Option<u16>,

    /// GPU selection overrides.
    #[serde(default)]
    pub gpu_index: Option<usize>,
    #[serde(default)]
    pub gpu_vendor: Option<String>,
    /// "discrete", "integrated" or "maxload".
    #[serde(default)]
    pub gpu_select: Option<String>,
    #[serde(default)]
    pub gpu_temp_sensor: Option<String>,
    #[serde(default)]
    pub gpu_load_sensor: Option<String>,

    /// Tick interval in milliseconds (clamped to 200-10000 at resolution).
    #[serde(default = "default_update_ms")]
    pub update_ms: u64,

    /// Seconds before the CH table-mode escalation.
    #[serde(default = "default_auto_table_sec")]
    pub auto_table_sec: u64,
}

fn default_cpu_mode() -> String {
    "c".to_string()
}

fn default_cpu_power_max() -> f32 {
    DEFAULT_CPU_POWER_CEILING_W
}

fn default_gpu_power_max() -> f32 {
    DEFAULT_GPU_POWER_CEILING_W
}

fn default_packet_len() -> usize {
    64
}

fn default_endian() -> String {
    "be".to_string()
}

fn default_update_ms() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}

fn default_auto_table_sec() -> u64 {
    DEFAULT_AUTO_TABLE_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cpu_mode: default_cpu_mode(),
            gpu_mode: None,
            cpu_mode_code: None,
            gpu_mode_code: None,
            cpu_power_max: default_cpu_power_max(),
            gpu_power_max: default_gpu_power_max(),
            table_mode: false,
            dual_mode: false,
            test_both_mode: false,
            packet_len: default_packet_len(),
            endian: default_endian(),
            vendor_id: None,
            product_id: None,
            gpu_index: None,
            gpu_vendor: None,
            gpu_select: None,
            gpu_temp_sensor: None,
            gpu_load_sensor: None,
            update_ms: default_update_ms(),
            auto_table_sec: default_auto_table_sec(),
        }
    }
}

impl AppConfig {
    /// Resolve the stored values into an immutable session configuration.
    pub fn resolve(&self) -> Result<ModeConfig> {
        let cpu_mode = DisplayMode::parse(&self.cpu_mode)?;
        let gpu_mode = self
            .gpu_mode
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(DisplayMode::parse)
            .transpose()?;
        let gpu_select = self
            .gpu_select
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(GpuSelect::parse)
            .transpose()?;
        let frame_length = FrameLength::from_bytes(self.packet_len)?;
        let big_endian = match self.endian.to_lowercase().as_str() {
            "be" | "big" | "bigendian" => true,
            "le" | "little" | "littleendian" => false,
            other => {
                return Err(DisplayError::InvalidConfig(format!(
                    "Byte order must be 'be' or 'le', got '{}'",
                    other
                )));
            }
        };

        Ok(ModeConfig {
            cpu_mode,
            gpu_mode,
            cpu_mode_code: self.cpu_mode_code,
            gpu_mode_code: self.gpu_mode_code,
            cpu_power_ceiling_w: self.cpu_power_max,
            gpu_power_ceiling_w: self.gpu_power_max,
            table_mode: self.table_mode,
            dual_mode: self.dual_mode,
            test_both_mode: self.test_both_mode,
            frame_length,
            big_endian,
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            gpu_index: self.gpu_index,
            gpu_vendor: self.gpu_vendor.clone(),
            gpu_select,
            gpu_temp_sensor: self.gpu_temp_sensor.clone(),
            gpu_load_sensor: self.gpu_load_sensor.clone(),
            update_interval_ms: self.update_ms,
            auto_table_secs: self.auto_table_sec,
        })
    }
}

// =============================================================================
// Load / Save
// =============================================================================

/// Load the config file, or defaults when it does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = get_config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the config file, creating the directory if needed.
pub fn save_config(config: &AppConfig) -> Result<()> {
    let dir = get_config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let contents = serde_json::to_string_pretty(config)?;
    std::fs::write(get_config_path()?, contents)?;
    Ok(())
}

/// Write a default config file when none exists, so users have a template
/// to edit.
pub fn ensure_config_exists() -> Result<()> {
    if !get_config_path()?.exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_resolves() {
        let config = AppConfig::default().resolve().unwrap();
        assert_eq!(config.cpu_mode, DisplayMode::Celsius);
        assert_eq!(config.gpu_mode, None);
        assert_eq!(config.cpu_power_ceiling_w, 200.0);
        assert_eq!(config.gpu_power_ceiling_w, 400.0);
        assert_eq!(config.frame_length, FrameLength::Full);
        assert!(config.big_endian);
        assert_eq!(config.update_interval_ms, 1000);
        assert_eq!(config.auto_table_secs, 8);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"cpu_mode": "usage", "table_mode": true}"#).unwrap();
        let config = parsed.resolve().unwrap();
        assert_eq!(config.cpu_mode, DisplayMode::Usage);
        assert!(config.table_mode);
        assert_eq!(config.frame_length, FrameLength::Full);
    }

    #[test]
    fn test_endian_parsing() {
        let mut app = AppConfig::default();
        app.endian = "LE".to_string();
        assert!(!app.resolve().unwrap().big_endian);
        app.endian = "bogus".to_string();
        assert!(app.resolve().is_err());
    }

    #[test]
    fn test_invalid_packet_len_rejected() {
        let mut app = AppConfig::default();
        app.packet_len = 32;
        assert!(app.resolve().is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut app = AppConfig::default();
        app.gpu_mode = Some("power".to_string());
        app.gpu_select = Some("discrete".to_string());
        app.update_ms = 2500;

        let json = serde_json::to_string(&app).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        let config = back.resolve().unwrap();
        assert_eq!(config.gpu_mode, Some(DisplayMode::Power));
        assert_eq!(config.gpu_select, Some(GpuSelect::Discrete));
        assert_eq!(config.update_interval_ms, 2500);
    }
}
