// src/data_input/header_params.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::axis_names::{Axis, AXIS_COUNT};
use crate::constants::{DEFAULT_ACTUATOR_LIMIT, DEFAULT_D_GAIN};
use crate::data_input::raw_table::RawHeader;

/// Firmware type detection for appropriate terminology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FirmwareType {
    Betaflight,
    EmuFlight,
    Inav,
    #[default]
    Unknown,
}

/// PID values for a single axis, in header units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisPid {
    pub p: Option<u32>,
    pub i: Option<u32>,
    pub d: Option<u32>,
    pub d_min: Option<u32>, // D-Min for Betaflight
    pub d_max: Option<u32>, // D-Max for newer Betaflight
    pub ff: Option<u32>,
}

impl AxisPid {
    /// Short gain summary with firmware-specific terminology, e.g. `P:31 I:56 D:15/35 FF:84`.
    pub fn format_summary(&self, firmware_type: FirmwareType) -> String {
        let mut parts = Vec::new();

        if let Some(p) = self.p {
            parts.push(format!("P:{}", p));
        }
        if let Some(i) = self.i {
            parts.push(format!("I:{}", i));
        }

        match (self.d, self.d_min, self.d_max) {
            (_, Some(d_min), Some(d_max)) if d_min != d_max => parts.push(format!("D:{}/{}", d_min, d_max)),
            (Some(d), None, Some(d_max)) if d != d_max => parts.push(format!("D:{}/{}", d, d_max)),
            (Some(d), _, _) => parts.push(format!("D:{}", d)),
            _ => {}
        }

        if let Some(ff) = self.ff.filter(|&ff| ff > 0) {
            let ff_label = match firmware_type {
                FirmwareType::EmuFlight => "DF",
                _ => "FF",
            };
            parts.push(format!("{}:{}", ff_label, ff));
        }

        parts.join(" ")
    }
}

/// Where a gain used in a reconstruction came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GainSource {
    /// Header key (lowercased) that carried the value.
    Header(String),
    /// No header key matched; a documented default was used.
    Fallback,
}

/// A gain value in header units plus its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainLookup {
    pub value: f64,
    pub source: GainSource,
}

impl GainLookup {
    pub fn is_fallback(&self) -> bool {
        self.source == GainSource::Fallback
    }
}

/// Header parameters of one log: PID gains per axis, firmware type and the
/// timing fields used as a sample-rate hint. Immutable after parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderParams {
    axes: [AxisPid; AXIS_COUNT],
    pub firmware_type: FirmwareType,
    lookup: HashMap<String, String>,
}

impl HeaderParams {
    /// Parse header key-value pairs. Supports Betaflight, EmuFlight and INAV
    /// spellings; returns empty values if no metadata is available.
    pub fn parse(header: &RawHeader) -> Self {
        let lookup = header.to_lookup();
        let mut params = HeaderParams {
            firmware_type: detect_firmware_type(&lookup),
            ..Default::default()
        };
        if lookup.is_empty() {
            return params;
        }

        for axis in Axis::ALL {
            if let Some(pid_str) = lookup.get(&format!("{}pid", axis.token())) {
                params.axes[axis.index()] = parse_axis_pid(pid_str);
            }
        }

        // Betaflight style: ff_weight / feedforward_weight with roll,pitch,yaw values
        if let Some(ff_str) = lookup.get("ff_weight").or_else(|| lookup.get("feedforward_weight")) {
            let ff_values = parse_comma_separated_values(ff_str);
            if ff_values.len() >= AXIS_COUNT {
                for axis in Axis::ALL {
                    if ff_values[axis.index()] > 0 {
                        params.axes[axis.index()].ff = Some(ff_values[axis.index()]);
                    }
                }
            }
        }

        // EmuFlight style: df_yaw for yaw feedforward only
        if let Some(df_yaw) = lookup.get("df_yaw").and_then(|v| v.parse::<u32>().ok()) {
            if df_yaw > 0 {
                params.axes[Axis::Yaw.index()].ff = Some(df_yaw);
            }
        }

        // D-Min / D-Max: comma-separated triple first, individual fields override.
        for (triple_key, suffixes, field) in [
            ("d_min", ["dmin", "_d_min"], DField::Min),
            ("d_max", ["dmax", "_d_max"], DField::Max),
        ] {
            if let Some(values) = lookup.get(triple_key).map(|v| parse_comma_separated_values(v)) {
                if values.len() >= AXIS_COUNT {
                    for axis in Axis::ALL {
                        field.set(&mut params.axes[axis.index()], values[axis.index()]);
                    }
                }
            }
            for axis in Axis::ALL {
                let single = suffixes
                    .iter()
                    .find_map(|suffix| lookup.get(&format!("{}{}", axis.token(), suffix)))
                    .and_then(|v| v.parse::<u32>().ok());
                if let Some(value) = single {
                    field.set(&mut params.axes[axis.index()], value);
                }
            }
        }

        params.lookup = lookup;
        params
    }

    pub fn axis(&self, axis: Axis) -> &AxisPid {
        &self.axes[axis.index()]
    }

    /// Case-insensitive raw parameter lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lookup.get(&key.trim().to_lowercase()).map(String::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse::<f64>().ok())
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// D gain for unfiltered D-term reconstruction. Tries the axis PID string,
    /// then the D-Max and D-Min fields; falls back to `DEFAULT_D_GAIN`.
    pub fn d_gain(&self, axis: Axis) -> GainLookup {
        let pid = self.axis(axis);
        let candidates = [
            (format!("{}pid", axis.token()), pid.d),
            ("d_max".to_string(), pid.d_max),
            ("d_min".to_string(), pid.d_min),
        ];
        for (key, value) in candidates {
            if let Some(v) = value.filter(|&v| v > 0) {
                return GainLookup { value: v as f64, source: GainSource::Header(key) };
            }
        }
        warn!(axis = %axis, fallback = DEFAULT_D_GAIN, "No D gain in header, using default");
        GainLookup { value: DEFAULT_D_GAIN, source: GainSource::Fallback }
    }

    /// I gain for I-term reconstruction, if the header carries one.
    pub fn i_gain(&self, axis: Axis) -> Option<GainLookup> {
        self.axis(axis).i.map(|i| GainLookup {
            value: i as f64,
            source: GainSource::Header(format!("{}pid", axis.token())),
        })
    }

    /// Clamp applied to the combined PID output (`pidsum_limit`, `pidsum_limit_yaw`).
    pub fn actuator_limit(&self, axis: Axis) -> f64 {
        let key = match axis {
            Axis::Yaw => "pidsum_limit_yaw",
            _ => "pidsum_limit",
        };
        self.get_f64(key)
            .or_else(|| self.get_f64("pidsum_limit"))
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_ACTUATOR_LIMIT)
    }

    /// Logged frame rate implied by the loop timing fields, in Hz.
    /// `looptime` (µs) × `pid_process_denom` × `frameIntervalPDenom`.
    pub fn sample_rate_hint(&self) -> Option<f64> {
        let looptime_us = self.get_f64("looptime").filter(|v| *v > 0.0)?;
        let pid_denom = self.get_f64("pid_process_denom").filter(|v| *v > 0.0).unwrap_or(1.0);
        let frame_denom = self.get_f64("frameintervalpdenom").filter(|v| *v > 0.0).unwrap_or(1.0);
        let period_s = looptime_us * pid_denom * frame_denom / 1_000_000.0;
        Some(1.0 / period_s)
    }
}

#[derive(Clone, Copy)]
enum DField {
    Min,
    Max,
}

impl DField {
    fn set(self, pid: &mut AxisPid, value: u32) {
        match self {
            DField::Min => pid.d_min = Some(value),
            DField::Max => pid.d_max = Some(value),
        }
    }
}

/// Detect firmware type from header metadata map
fn detect_firmware_type(lookup: &HashMap<String, String>) -> FirmwareType {
    for key in ["firmware revision", "firmware type"] {
        if let Some(value) = lookup.get(key) {
            let value = value.to_lowercase();
            if value.contains("emuflight") {
                return FirmwareType::EmuFlight;
            }
            if value.contains("betaflight") {
                return FirmwareType::Betaflight;
            }
            if value.contains("inav") {
                return FirmwareType::Inav;
            }
        }
    }

    if lookup.contains_key("df_yaw") {
        return FirmwareType::EmuFlight;
    }
    if lookup.contains_key("ff_weight") {
        return FirmwareType::Betaflight;
    }

    FirmwareType::Unknown
}

/// Parse PID values from a string like "31,56,21" (basic) or "45,80,40,120" (INAV with FF)
/// or "57,66,58,58,206" (Betaflight 4.6+ with P,I,D,D-Max,FF)
fn parse_axis_pid(pid_str: &str) -> AxisPid {
    let values = parse_comma_separated_values(pid_str);

    let mut axis_pid = AxisPid {
        p: values.first().copied(),
        i: values.get(1).copied(),
        d: values.get(2).copied(),
        ..Default::default()
    };

    match values.len() {
        4 => {
            // INAV style: P,I,D,FF
            axis_pid.ff = Some(values[3]).filter(|&v| v > 0);
        }
        5 => {
            // Betaflight 4.6+ style: P,I,D,D-Max,FF
            axis_pid.d_max = Some(values[3]);
            axis_pid.ff = Some(values[4]).filter(|&v| v > 0);
        }
        _ => {}
    }

    axis_pid
}

fn parse_comma_separated_values(value_str: &str) -> Vec<u32> {
    value_str
        .split(',')
        .filter_map(|s| s.trim().parse::<u32>().ok())
        .collect()
}
