// src/data_input/schema.rs

//! Maps the raw column names of a decoded log onto canonical signal keys.
//!
//! Column names drift across firmware revisions and logging configurations
//! (`gyroADC[0]` vs `gyro[0]`, `gyroUnfilt[0]` vs a `debug[0]` channel,
//! `axisI[0]` vs `axisPID[0].I`). Every canonical key owns an ordered list of
//! accepted raw spellings; the first spelling present wins. Each key is
//! resolved on its own, so one axis may use a legacy family while another
//! does not.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::axis_names::Axis;
use crate::error::SchemaError;
use crate::signal_table::{GyroSource, SignalKey};

/// Highest motor index probed in the raw columns.
pub const MAX_MOTORS: u8 = 8;

/// Unit of the raw time column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Microseconds,
    Milliseconds,
    Seconds,
    /// No unit suffix; the magnitude of the values decides.
    Inferred,
}

impl TimeUnit {
    /// Unit declared by a column name suffix such as `time (us)`.
    pub fn from_column_name(raw: &str) -> TimeUnit {
        let lower = raw.trim().to_lowercase();
        match unit_suffix(&lower) {
            Some("us") | Some("µs") => TimeUnit::Microseconds,
            Some("ms") => TimeUnit::Milliseconds,
            Some("s") => TimeUnit::Seconds,
            _ => TimeUnit::Inferred,
        }
    }
}

/// Groups of canonical signals a caller may require before an analysis runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    FilteredGyro,
    RawGyro,
    Setpoint,
    PidTerms,
    Feedforward,
    Throttle,
    Motors,
}

impl Feature {
    /// Canonical keys this feature needs.
    pub fn keys(self) -> Vec<SignalKey> {
        let per_axis = |f: fn(Axis) -> SignalKey| Axis::ALL.iter().map(|&a| f(a)).collect::<Vec<_>>();
        match self {
            Feature::FilteredGyro => per_axis(|axis| SignalKey::Gyro { source: GyroSource::Filtered, axis }),
            Feature::RawGyro => per_axis(|axis| SignalKey::Gyro { source: GyroSource::Raw, axis }),
            Feature::Setpoint => per_axis(SignalKey::Setpoint),
            Feature::PidTerms => {
                let mut keys = per_axis(SignalKey::PTerm);
                keys.extend(per_axis(SignalKey::ITerm));
                keys.extend(per_axis(SignalKey::DTerm));
                keys
            }
            Feature::Feedforward => per_axis(SignalKey::Feedforward),
            Feature::Throttle => vec![SignalKey::Throttle],
            // At least the first four motors of a quad.
            Feature::Motors => (0..4).map(SignalKey::Motor).collect(),
        }
    }
}

/// One accepted raw spelling for a canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Spelling {
    normalized: String,
    legacy: bool,
}

/// Ordered list of raw spellings for one canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRule {
    pub key: SignalKey,
    spellings: Vec<Spelling>,
}

impl ColumnRule {
    fn new(key: SignalKey, preferred: &[String], legacy: &[String]) -> Self {
        let spellings = preferred
            .iter()
            .map(|s| Spelling { normalized: normalize_column_name(s), legacy: false })
            .chain(legacy.iter().map(|s| Spelling { normalized: normalize_column_name(s), legacy: true }))
            .collect();
        Self { key, spellings }
    }

    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        self.spellings.iter().map(|s| s.normalized.as_str())
    }
}

/// The full rule table, in canonical key order.
pub fn canonical_rules() -> Vec<ColumnRule> {
    let mut rules = vec![ColumnRule::new(SignalKey::Time, &["time".to_string()], &[])];

    for axis in Axis::ALL {
        let i = axis.index();
        rules.push(ColumnRule::new(
            SignalKey::Gyro { source: GyroSource::Raw, axis },
            &[format!("gyroUnfilt[{i}]")],
            &[format!("debug[{i}]")],
        ));
        rules.push(ColumnRule::new(
            SignalKey::Gyro { source: GyroSource::Filtered, axis },
            &[format!("gyroADC[{i}]"), format!("gyro[{i}]")],
            &[],
        ));
        rules.push(ColumnRule::new(
            SignalKey::Setpoint(axis),
            &[format!("setpoint[{i}]")],
            &[format!("rcCommand[{i}]")],
        ));
        rules.push(ColumnRule::new(SignalKey::RcCommand(axis), &[format!("rcCommand[{i}]")], &[]));
        rules.push(ColumnRule::new(SignalKey::PTerm(axis), &[format!("axisP[{i}]")], &[]));
        rules.push(ColumnRule::new(
            SignalKey::ITerm(axis),
            &[format!("axisI[{i}]"), format!("iterm[{i}]"), format!("axisPID[{i}].I")],
            &[],
        ));
        rules.push(ColumnRule::new(SignalKey::DTerm(axis), &[format!("axisD[{i}]")], &[]));
        rules.push(ColumnRule::new(SignalKey::Feedforward(axis), &[format!("axisF[{i}]")], &[]));
    }

    rules.push(ColumnRule::new(
        SignalKey::Throttle,
        &["setpoint[3]".to_string(), "rcCommand[3]".to_string(), "throttle".to_string()],
        &[],
    ));
    for n in 0..MAX_MOTORS {
        rules.push(ColumnRule::new(SignalKey::Motor(n), &[format!("motor[{n}]")], &[]));
    }

    rules.sort_by(|a, b| a.key.cmp(&b.key));
    rules
}

/// Lowercases, trims, drops a trailing ` (unit)` suffix and inner whitespace.
///
/// `"gyroADC[0] (deg/s)"` and `" gyroadc[0]"` both normalise to `"gyroadc[0]"`.
pub fn normalize_column_name(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let stem = match lower.rfind('(') {
        Some(pos) if lower.ends_with(')') => &lower[..pos],
        _ => lower.as_str(),
    };
    stem.chars().filter(|c| !c.is_whitespace()).collect()
}

fn unit_suffix(lower: &str) -> Option<&str> {
    let open = lower.rfind('(')?;
    lower.strip_suffix(')').map(|s| s[open + 1..].trim())
}

/// Outcome of resolving one raw column set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedSchema {
    columns: BTreeMap<SignalKey, String>,
    legacy: BTreeSet<SignalKey>,
}

impl ResolvedSchema {
    /// Raw column backing a canonical key.
    pub fn column(&self, key: &SignalKey) -> Option<&str> {
        self.columns.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &SignalKey) -> bool {
        self.columns.contains_key(key)
    }

    /// All resolved (canonical key, raw column) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SignalKey, &str)> {
        self.columns.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Keys that were satisfied by a legacy column family.
    pub fn legacy_keys(&self) -> impl Iterator<Item = &SignalKey> {
        self.legacy.iter()
    }

    pub fn used_legacy(&self, key: &SignalKey) -> bool {
        self.legacy.contains(key)
    }

    /// Unit of the time column, if one was found.
    pub fn time_unit(&self) -> Option<TimeUnit> {
        self.column(&SignalKey::Time).map(TimeUnit::from_column_name)
    }

    /// Fails listing every key the requested features need but the log lacks.
    pub fn require(&self, features: &[Feature]) -> Result<(), SchemaError> {
        let mut missing: Vec<SignalKey> = features
            .iter()
            .flat_map(|f| f.keys())
            .filter(|k| !self.contains(k))
            .collect();
        if !self.contains(&SignalKey::Time) {
            missing.push(SignalKey::Time);
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::new(missing))
        }
    }

    pub(crate) fn remove(&mut self, key: &SignalKey) {
        self.columns.remove(key);
        self.legacy.remove(key);
    }
}

/// Resolves a raw column name set against the canonical rule table.
///
/// Total and order-independent: every rule is evaluated, and the same column
/// set always yields the same mapping.
pub fn resolve_columns<S: AsRef<str>>(raw_columns: &[S]) -> ResolvedSchema {
    // First raw spelling wins when two columns normalise identically.
    let mut by_normalized: HashMap<String, &str> = HashMap::new();
    for raw in raw_columns {
        by_normalized
            .entry(normalize_column_name(raw.as_ref()))
            .or_insert_with(|| raw.as_ref().trim());
    }

    let mut resolved = ResolvedSchema::default();
    for rule in canonical_rules() {
        let hit = rule
            .spellings
            .iter()
            .find_map(|s| by_normalized.get(&s.normalized).map(|raw| (*raw, s.legacy)));
        if let Some((raw, legacy)) = hit {
            if legacy {
                warn!(key = %rule.key, column = raw, "Falling back to legacy column family");
                resolved.legacy.insert(rule.key);
            }
            debug!(key = %rule.key, column = raw, "Resolved column");
            resolved.columns.insert(rule.key, raw.to_string());
        }
    }
    resolved
}
