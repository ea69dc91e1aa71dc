//! Hardware sensor model and provider abstraction.
//!
//! The session consumes a snapshot of hardware units (CPU packages, GPUs)
//! exposing named sensors with current values. A [`HardwareProvider`]
//! refreshes values in place; the selection heuristics in [`selector`]
//! decide which sensor feeds each display slot.

pub mod provider;
pub mod selector;

pub use provider::SystemProvider;
pub use selector::{CpuReadings, GpuSelection, SensorRef, select_cpu, select_gpu};

// =============================================================================
// Snapshot Model
// =============================================================================

/// Hardware unit category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareKind {
    Cpu,
    Gpu,
    Other,
}

/// Sensor category within a hardware unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Load,
    Power,
    Other,
}

/// A single sensor reading inside a hardware unit.
#[derive(Debug, Clone)]
pub struct SensorReading {
    pub kind: SensorKind,
    pub name: String,
    pub value: Option<f32>,
}

impl SensorReading {
    pub fn new(kind: SensorKind, name: impl Into<String>, value: Option<f32>) -> Self {
        Self {
            kind,
            name: name.into(),
            value,
        }
    }
}

/// An enumerable hardware unit with its current sensor readings.
#[derive(Debug, Clone)]
pub struct HardwareUnit {
    pub kind: HardwareKind,
    pub name: String,
    pub sensors: Vec<SensorReading>,
}

impl HardwareUnit {
    pub fn new(kind: HardwareKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            sensors: Vec::new(),
        }
    }
}

/// Source of hardware snapshots.
///
/// `update` refreshes sensor values in place; `units` returns the current
/// snapshot. Enumeration order is stable across updates, which the
/// selection heuristics rely on for deterministic tie-breaking.
pub trait HardwareProvider: Send {
    fn update(&mut self);
    fn units(&self) -> &[HardwareUnit];
}

// =============================================================================
// Telemetry Sample
// =============================================================================

/// One tick's worth of host telemetry. Produced fresh every tick, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySample {
    pub cpu_temp_c: Option<f32>,
    pub cpu_load_pct: Option<u8>,
    pub cpu_power_w: Option<f32>,
    pub gpu_temp_c: Option<f32>,
    pub gpu_load_pct: Option<u8>,
    pub gpu_power_w: Option<f32>,
}

impl TelemetrySample {
    /// The CPU triple (temperature, load, power) is mandatory for a tick
    /// to emit anything.
    pub fn has_mandatory_cpu(&self) -> bool {
        self.cpu_temp_c.is_some() && self.cpu_load_pct.is_some() && self.cpu_power_w.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandatory_cpu_triple() {
        let mut sample = TelemetrySample::default();
        assert!(!sample.has_mandatory_cpu());

        sample.cpu_temp_c = Some(50.0);
        sample.cpu_load_pct = Some(30);
        assert!(!sample.has_mandatory_cpu());

        sample.cpu_power_w = Some(65.0);
        assert!(sample.has_mandatory_cpu());
    }
}
