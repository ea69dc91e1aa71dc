//! System-backed hardware provider.
//!
//! Builds the hardware snapshot from `sysinfo` (component temperatures and
//! CPU utilization) plus, on Linux, hwmon power channels read from sysfs.
//! The snapshot is shaped so the selector heuristics see the same names a
//! full hardware-monitoring stack would expose: the CPU package power
//! sensor is named "CPU Package", the aggregate load "CPU Total".

use sysinfo::{Components, System};

use crate::sensors::{HardwareKind, HardwareProvider, HardwareUnit, SensorKind, SensorReading};

/// Component label patterns indicating a CPU temperature sensor.
const CPU_TEMP_PATTERNS: [&str; 5] = ["cpu", "package", "core", "tdie", "k10temp"];

/// Component label patterns indicating a GPU temperature sensor.
const GPU_TEMP_PATTERNS: [&str; 5] = ["gpu", "nvidia", "amdgpu", "radeon", "edge"];

/// Hardware snapshot provider backed by the host OS.
pub struct SystemProvider {
    system: System,
    components: Components,
    units: Vec<HardwareUnit>,
}

impl SystemProvider {
    pub fn new() -> Self {
        let mut provider = Self {
            system: System::new(),
            components: Components::new_with_refreshed_list(),
            units: Vec::new(),
        };
        provider.update();
        provider
    }

    fn rebuild_units(&mut self) {
        let mut cpu = HardwareUnit::new(HardwareKind::Cpu, "CPU");
        let mut gpus: Vec<HardwareUnit> = Vec::new();

        cpu.sensors.push(SensorReading::new(
            SensorKind::Load,
            "CPU Total",
            Some(self.system.global_cpu_usage()),
        ));

        for component in self.components.iter() {
            let label = component.label().to_string();
            let lower = label.to_lowercase();
            let value = component.temperature();

            if GPU_TEMP_PATTERNS.iter().any(|p| lower.contains(p)) {
                // One unit per GPU-ish component label; sysinfo does not
                // group sensors by device.
                let mut unit = HardwareUnit::new(HardwareKind::Gpu, label.clone());
                unit.sensors.push(SensorReading::new(
                    SensorKind::Temperature,
                    "GPU Core",
                    value,
                ));
                gpus.push(unit);
            } else if CPU_TEMP_PATTERNS.iter().any(|p| lower.contains(p)) {
                // Name carries "Core" so the selector's pattern match hits.
                cpu.sensors.push(SensorReading::new(
                    SensorKind::Temperature,
                    format!("Core ({})", label),
                    value,
                ));
            }
        }

        if let Some(power) = read_cpu_package_power() {
            cpu.sensors.push(SensorReading::new(
                SensorKind::Power,
                "CPU Package",
                Some(power),
            ));
        }

        self.units.clear();
        self.units.push(cpu);
        self.units.extend(gpus);
    }
}

impl Default for SystemProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareProvider for SystemProvider {
    fn update(&mut self) {
        self.system.refresh_cpu_usage();
        self.components.refresh(true);
        self.rebuild_units();
    }

    fn units(&self) -> &[HardwareUnit] {
        &self.units
    }
}

/// Read the CPU package power draw from a hwmon power channel, in watts.
///
/// Scans /sys/class/hwmon for chips whose name suggests a CPU energy
/// counter (amd_energy, zenpower, coretemp-adjacent rapl) and reads the
/// first power*_average / power*_input channel (microwatts).
#[cfg(target_os = "linux")]
fn read_cpu_package_power() -> Option<f32> {
    use std::fs;

    const CPU_POWER_CHIPS: [&str; 4] = ["amd_energy", "zenpower", "rapl", "power_meter"];

    let entries = fs::read_dir("/sys/class/hwmon").ok()?;
    for entry in entries.flatten() {
        let dir = entry.path();
        let chip = fs::read_to_string(dir.join("name"))
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        if !CPU_POWER_CHIPS.iter().any(|p| chip.contains(p)) {
            continue;
        }
        for channel in ["power1_average", "power1_input"] {
            if let Ok(raw) = fs::read_to_string(dir.join(channel))
                && let Ok(microwatts) = raw.trim().parse::<f64>()
            {
                return Some((microwatts / 1_000_000.0) as f32);
            }
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_package_power() -> Option<f32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_has_cpu_unit() {
        let provider = SystemProvider::new();
        let units = provider.units();
        assert!(!units.is_empty());
        assert_eq!(units[0].kind, HardwareKind::Cpu);
        // The aggregate load slot always exists, even on sensorless CI hosts.
        assert!(
            units[0]
                .sensors
                .iter()
                .any(|s| s.kind == SensorKind::Load && s.name == "CPU Total")
        );
    }

    #[test]
    fn test_update_keeps_enumeration_stable() {
        let mut provider = SystemProvider::new();
        let before: Vec<String> = provider.units().iter().map(|u| u.name.clone()).collect();
        provider.update();
        let after: Vec<String> = provider.units().iter().map(|u| u.name.clone()).collect();
        assert_eq!(before, after);
    }
}
