//! Sensor selection heuristics.
//!
//! CPU selection is an unconditional pattern match, re-evaluated every
//! tick. GPU selection runs once per session and is cached; it scores
//! hardware units and candidate sensors with ordered (substring, weight)
//! rule tables, with ties always resolving to enumeration order.

use crate::config::{GpuSelect, ModeConfig};
use crate::sensors::{HardwareKind, HardwareUnit, SensorKind, SensorReading};

// =============================================================================
// Rule Tables
// =============================================================================

/// Name markers that indicate a discrete GPU.
const DISCRETE_GPU_MARKERS: [&str; 4] = ["nvidia", "geforce", "radeon", "amd "];

/// Weight added to discrete GPU units.
const DISCRETE_UNIT_WEIGHT: i64 = 50;

/// Weight added to Intel (integrated) GPU units.
const INTEL_UNIT_WEIGHT: i64 = 10;

/// Weight added by an explicit discrete/integrated selection preference.
const SELECT_PREFERENCE_WEIGHT: i64 = 100;

/// Score granted by an explicit sensor name override match.
const OVERRIDE_MATCH_SCORE: i64 = 100;

/// Temperature readings at or above this are bogus sentinels.
const MAX_PLAUSIBLE_TEMP_C: f32 = 200.0;

const TEMP_SENSOR_RULES: [(&str, i64); 3] = [("core", 40), ("gpu", 30), ("temp", 20)];
const LOAD_SENSOR_RULES: [(&str, i64); 4] = [("gpu", 40), ("core", 15), ("load", 25), ("total", 30)];
const POWER_SENSOR_RULES: [(&str, i64); 3] = [("board", 50), ("power", 30), ("gpu", 10)];

// =============================================================================
// CPU Selection
// =============================================================================

/// Current CPU readings for the three mandatory display slots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuReadings {
    pub power_w: Option<f32>,
    pub temp_c: Option<f32>,
    pub load_pct: Option<f32>,
}

/// Pick the CPU sensors feeding power/temperature/load.
///
/// First CPU-unit sensor matching each pattern wins: power contains
/// "Package", temperature contains "Core", load contains "CPU Total".
/// Cheap and stable, so it runs fresh every tick.
pub fn select_cpu(units: &[HardwareUnit]) -> CpuReadings {
    let mut readings = CpuReadings::default();

    for unit in units.iter().filter(|u| u.kind == HardwareKind::Cpu) {
        for sensor in &unit.sensors {
            let value = match sensor.value {
                Some(v) => v,
                None => continue,
            };
            match sensor.kind {
                SensorKind::Power if readings.power_w.is_none() && sensor.name.contains("Package") => {
                    readings.power_w = Some(value);
                }
                SensorKind::Temperature
                    if readings.temp_c.is_none() && sensor.name.contains("Core") =>
                {
                    readings.temp_c = Some(value);
                }
                SensorKind::Load
                    if readings.load_pct.is_none() && sensor.name.contains("CPU Total") =>
                {
                    readings.load_pct = Some(value);
                }
                _ => {}
            }
        }
    }

    readings
}

// =============================================================================
// GPU Selection
// =============================================================================

/// Index reference into a hardware snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorRef {
    pub unit: usize,
    pub sensor: usize,
}

impl SensorRef {
    fn resolve<'a>(&self, units: &'a [HardwareUnit]) -> Option<&'a SensorReading> {
        units.get(self.unit)?.sensors.get(self.sensor)
    }
}

/// Cached GPU sensor selection. Write-once per session unless empty;
/// only sensor *values* are refreshed each tick, not the selection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpuSelection {
    pub unit: Option<usize>,
    pub temp: Option<SensorRef>,
    pub load: Option<SensorRef>,
    pub power: Option<SensorRef>,
}

impl GpuSelection {
    /// An empty selection triggers re-selection on the next tick.
    pub fn is_empty(&self) -> bool {
        self.temp.is_none() && self.load.is_none() && self.power.is_none()
    }

    /// Read fresh values from a snapshot through the cached references.
    pub fn read(&self, units: &[HardwareUnit]) -> (Option<f32>, Option<f32>, Option<f32>) {
        let temp = self.temp.and_then(|r| r.resolve(units)).and_then(|s| s.value);
        let load = self.load.and_then(|r| r.resolve(units)).and_then(|s| s.value);
        let power = self.power.and_then(|r| r.resolve(units)).and_then(|s| s.value);
        (temp, load, power)
    }
}

/// Select the GPU hardware unit and its temperature/load/power sensors.
pub fn select_gpu(units: &[HardwareUnit], config: &ModeConfig) -> GpuSelection {
    let gpu_units: Vec<usize> = units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.kind == HardwareKind::Gpu)
        .map(|(i, _)| i)
        .collect();

    let selected = select_gpu_unit(units, &gpu_units, config);

    // Candidate pool: the selected unit, or every GPU unit when none exists.
    let pool: Vec<SensorRef> = match selected {
        Some(unit) => sensor_refs(units, &[unit]),
        None => sensor_refs(units, &gpu_units),
    };

    GpuSelection {
        unit: selected,
        temp: rank_temp(units, &pool, config.gpu_temp_sensor.as_deref()),
        load: rank_by_rules(
            units,
            &pool,
            SensorKind::Load,
            &LOAD_SENSOR_RULES,
            config.gpu_load_sensor.as_deref(),
        ),
        power: rank_by_rules(units, &pool, SensorKind::Power, &POWER_SENSOR_RULES, None),
    }
}

/// Pick the GPU hardware unit: index override, then vendor substring
/// override, then weighted scoring, then the first enumerated unit.
fn select_gpu_unit(
    units: &[HardwareUnit],
    gpu_units: &[usize],
    config: &ModeConfig,
) -> Option<usize> {
    if let Some(index) = config.gpu_index
        && index < gpu_units.len()
    {
        return Some(gpu_units[index]);
    }

    if let Some(vendor) = config.gpu_vendor.as_deref() {
        let needle = vendor.to_lowercase();
        if let Some(&idx) = gpu_units
            .iter()
            .find(|&&i| units[i].name.to_lowercase().contains(&needle))
        {
            return Some(idx);
        }
    }

    // Strictly-greater comparison keeps the first-encountered unit on ties.
    let mut best: Option<(usize, i64)> = None;
    for &idx in gpu_units {
        let score = unit_score(&units[idx], config.gpu_select);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((idx, score));
        }
    }

    best.map(|(idx, _)| idx).or_else(|| gpu_units.first().copied())
}

fn is_discrete_name(name: &str) -> bool {
    DISCRETE_GPU_MARKERS.iter().any(|m| name.contains(m))
}

fn unit_score(unit: &HardwareUnit, select: Option<GpuSelect>) -> i64 {
    let name = unit.name.to_lowercase();
    let discrete = is_discrete_name(&name);

    let mut score = 0;
    if discrete {
        score += DISCRETE_UNIT_WEIGHT;
    }
    if name.contains("intel") {
        score += INTEL_UNIT_WEIGHT;
    }

    match select {
        Some(GpuSelect::Discrete) if discrete => score += SELECT_PREFERENCE_WEIGHT,
        Some(GpuSelect::Integrated) if !discrete => score += SELECT_PREFERENCE_WEIGHT,
        Some(GpuSelect::MaxLoad) => {
            if let Some(load) = unit_core_load(unit) {
                score += load.min(100.0) as i64;
            }
        }
        _ => {}
    }

    score
}

/// Current core-load reading of a unit, used by the MaxLoad preference.
fn unit_core_load(unit: &HardwareUnit) -> Option<f32> {
    unit.sensors
        .iter()
        .filter(|s| s.kind == SensorKind::Load)
        .max_by_key(|s| rule_score(&s.name, &LOAD_SENSOR_RULES))
        .and_then(|s| s.value)
}

fn sensor_refs(units: &[HardwareUnit], unit_indices: &[usize]) -> Vec<SensorRef> {
    let mut refs = Vec::new();
    for &unit in unit_indices {
        for sensor in 0..units[unit].sensors.len() {
            refs.push(SensorRef { unit, sensor });
        }
    }
    refs
}

fn rule_score(name: &str, rules: &[(&str, i64)]) -> i64 {
    let name = name.to_lowercase();
    rules
        .iter()
        .filter(|(marker, _)| name.contains(marker))
        .map(|(_, weight)| weight)
        .sum()
}

fn candidate_score(sensor: &SensorReading, rules: &[(&str, i64)], override_name: Option<&str>) -> i64 {
    if let Some(needle) = override_name
        && sensor.name.to_lowercase().contains(&needle.to_lowercase())
    {
        return OVERRIDE_MATCH_SCORE;
    }
    rule_score(&sensor.name, rules)
}

/// Rank candidates of one kind; highest score wins, first-encountered on
/// ties (max_by keeps the last maximum, so compare strictly).
fn rank_by_rules(
    units: &[HardwareUnit],
    pool: &[SensorRef],
    kind: SensorKind,
    rules: &[(&str, i64)],
    override_name: Option<&str>,
) -> Option<SensorRef> {
    let mut best: Option<(SensorRef, i64)> = None;
    for &r in pool {
        let Some(sensor) = r.resolve(units) else {
            continue;
        };
        if sensor.kind != kind {
            continue;
        }
        let score = candidate_score(sensor, rules, override_name);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((r, score));
        }
    }
    best.map(|(r, _)| r)
}

/// Temperature ranking adds the plausibility filter: sentinel readings
/// (>= 200) and missing values are rejected outright.
fn rank_temp(
    units: &[HardwareUnit],
    pool: &[SensorRef],
    override_name: Option<&str>,
) -> Option<SensorRef> {
    let mut best: Option<(SensorRef, i64)> = None;
    for &r in pool {
        let Some(sensor) = r.resolve(units) else {
            continue;
        };
        if sensor.kind != SensorKind::Temperature {
            continue;
        }
        match sensor.value {
            Some(v) if v < MAX_PLAUSIBLE_TEMP_C => {}
            _ => continue,
        }
        let score = candidate_score(sensor, &TEMP_SENSOR_RULES, override_name);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((r, score));
        }
    }
    best.map(|(r, _)| r)
}

// =============================================================================
// Tests
// =============================================================================
