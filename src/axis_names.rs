// src/axis_names.rs

/// Centralized axis naming utilities
///
/// Provides consistent axis names and the canonical lowercase tokens used in
/// signal keys (`gyro.raw.roll`, `setpoint.yaw`, ...).
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of rotational axes carried by a log.
pub const AXIS_COUNT: usize = 3;

/// Get all axis names as a static array
pub const AXIS_NAMES: [&str; AXIS_COUNT] = ["Roll", "Pitch", "Yaw"];

/// A rotational control axis. Index order matches the `[0]`, `[1]`, `[2]`
/// suffixes used by the firmware column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    /// Axis for a firmware column index (0=Roll, 1=Pitch, 2=Yaw).
    pub fn from_index(index: usize) -> Option<Axis> {
        Axis::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            Axis::Roll => 0,
            Axis::Pitch => 1,
            Axis::Yaw => 2,
        }
    }

    /// Display name ("Roll", "Pitch", "Yaw").
    pub fn name(self) -> &'static str {
        AXIS_NAMES[self.index()]
    }

    /// Lowercase token used inside canonical signal keys.
    pub fn token(self) -> &'static str {
        match self {
            Axis::Roll => "roll",
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roll" | "0" => Ok(Axis::Roll),
            "pitch" | "1" => Ok(Axis::Pitch),
            "yaw" | "2" => Ok(Axis::Yaw),
            other => Err(format!(
                "Invalid axis '{}'. Expected roll, pitch or yaw (or 0, 1, 2)",
                other
            )),
        }
    }
}
