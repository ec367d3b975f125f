// src/signal_table.rs

//! Canonical in-memory representation of one loaded flight.
//!
//! A [`SignalTable`] holds every resolved channel as a [`SignalSeries`] on a
//! single shared time base. [`load`] builds one from the decoder's raw table:
//! it normalises time to seconds from zero, drops rows that would break
//! monotonic time, fills interior gaps, and resolves column names through the
//! schema rules.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::axis_names::Axis;
use crate::constants::{MIN_TIME_DELTA_S, TIME_MICROSECONDS_THRESHOLD, TIME_MILLISECONDS_THRESHOLD};
use crate::data_input::header_params::HeaderParams;
use crate::data_input::raw_table::{RawHeader, RawTable};
use crate::data_input::schema::{resolve_columns, Feature, ResolvedSchema, TimeUnit};
use crate::error::{AnalysisError, AnalysisResult};

/// Which gyro family a series comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GyroSource {
    /// Before the firmware's gyro filters.
    Raw,
    /// As used by the PID loop.
    Filtered,
}

impl GyroSource {
    pub fn token(self) -> &'static str {
        match self {
            GyroSource::Raw => "raw",
            GyroSource::Filtered => "filtered",
        }
    }
}

/// Canonical signal identifier, printed as e.g. `gyro.raw.roll` or `motor.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalKey {
    Time,
    Gyro { source: GyroSource, axis: Axis },
    Setpoint(Axis),
    RcCommand(Axis),
    PTerm(Axis),
    ITerm(Axis),
    DTerm(Axis),
    Feedforward(Axis),
    Throttle,
    Motor(u8),
    // Derived
    DTermUnfiltered(Axis),
    TrackingError(Axis),
    PidOutput(Axis),
    CumulativeError(Axis),
}

impl SignalKey {
    pub fn gyro_raw(axis: Axis) -> Self {
        SignalKey::Gyro { source: GyroSource::Raw, axis }
    }

    pub fn gyro_filtered(axis: Axis) -> Self {
        SignalKey::Gyro { source: GyroSource::Filtered, axis }
    }

    /// Axis of a per-axis key.
    pub fn axis(&self) -> Option<Axis> {
        match *self {
            SignalKey::Gyro { axis, .. }
            | SignalKey::Setpoint(axis)
            | SignalKey::RcCommand(axis)
            | SignalKey::PTerm(axis)
            | SignalKey::ITerm(axis)
            | SignalKey::DTerm(axis)
            | SignalKey::Feedforward(axis)
            | SignalKey::DTermUnfiltered(axis)
            | SignalKey::TrackingError(axis)
            | SignalKey::PidOutput(axis)
            | SignalKey::CumulativeError(axis) => Some(axis),
            SignalKey::Time | SignalKey::Throttle | SignalKey::Motor(_) => None,
        }
    }

    /// Keys computed by the derived-signal calculator rather than read from a column.
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            SignalKey::DTermUnfiltered(_)
                | SignalKey::TrackingError(_)
                | SignalKey::PidOutput(_)
                | SignalKey::CumulativeError(_)
        )
    }

    fn prefix(&self) -> &'static str {
        match self {
            SignalKey::Time => "time",
            SignalKey::Gyro { .. } => "gyro",
            SignalKey::Setpoint(_) => "setpoint",
            SignalKey::RcCommand(_) => "rcCommand",
            SignalKey::PTerm(_) => "pTerm",
            SignalKey::ITerm(_) => "iTerm",
            SignalKey::DTerm(_) => "dTerm",
            SignalKey::Feedforward(_) => "feedforward",
            SignalKey::Throttle => "throttle",
            SignalKey::Motor(_) => "motor",
            SignalKey::DTermUnfiltered(_) => "dTermUnfiltered",
            SignalKey::TrackingError(_) => "trackingError",
            SignalKey::PidOutput(_) => "pidOutput",
            SignalKey::CumulativeError(_) => "cumulativeError",
        }
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKey::Gyro { source, axis } => write!(f, "gyro.{}.{}", source.token(), axis),
            SignalKey::Motor(n) => write!(f, "motor.{}", n),
            other => match other.axis() {
                Some(axis) => write!(f, "{}.{}", other.prefix(), axis),
                None => f.write_str(other.prefix()),
            },
        }
    }
}

impl FromStr for SignalKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let bad = || format!("Unknown signal key '{}'", s);
        let axis = |token: &str| token.parse::<Axis>().map_err(|_| bad());

        match parts.as_slice() {
            ["time"] => Ok(SignalKey::Time),
            ["throttle"] => Ok(SignalKey::Throttle),
            ["motor", n] => n.parse::<u8>().map(SignalKey::Motor).map_err(|_| bad()),
            ["gyro", "raw", a] => Ok(SignalKey::gyro_raw(axis(*a)?)),
            ["gyro", "filtered", a] => Ok(SignalKey::gyro_filtered(axis(*a)?)),
            [prefix, a] => {
                let axis = axis(*a)?;
                let ctor: fn(Axis) -> SignalKey = match *prefix {
                    "setpoint" => SignalKey::Setpoint,
                    "rcCommand" => SignalKey::RcCommand,
                    "pTerm" => SignalKey::PTerm,
                    "iTerm" => SignalKey::ITerm,
                    "dTerm" => SignalKey::DTerm,
                    "feedforward" => SignalKey::Feedforward,
                    "dTermUnfiltered" => SignalKey::DTermUnfiltered,
                    "trackingError" => SignalKey::TrackingError,
                    "pidOutput" => SignalKey::PidOutput,
                    "cumulativeError" => SignalKey::CumulativeError,
                    _ => return Err(bad()),
                };
                Ok(ctor(axis))
            }
            _ => Err(bad()),
        }
    }
}

/// One channel: values against the (shared, immutable) time base in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    pub key: SignalKey,
    pub time: Arc<Array1<f64>>,
    pub values: Array1<f64>,
}

impl SignalSeries {
    pub fn new(key: SignalKey, time: Arc<Array1<f64>>, values: Array1<f64>) -> AnalysisResult<Self> {
        if time.len() != values.len() {
            return Err(AnalysisError::ShapeMismatch {
                context: "series time base",
                expected: time.len(),
                actual: values.len(),
            });
        }
        Ok(Self { key, time, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (time, value) pairs in order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.values.iter().copied())
    }
}

/// All series of one loaded flight plus its header and scalar metadata.
#[derive(Debug, Clone)]
pub struct SignalTable {
    series: BTreeMap<SignalKey, SignalSeries>,
    time: Arc<Array1<f64>>,
    header: HeaderParams,
    schema: ResolvedSchema,
    pub sample_rate_hz: f64,
    pub duration_s: f64,
    pub row_count: usize,
}

impl SignalTable {
    /// Builds a table directly from a time vector (seconds) and per-key values.
    /// Every value vector must match the time vector's length.
    pub fn from_columns(
        time: Vec<f64>,
        columns: Vec<(SignalKey, Vec<f64>)>,
        header: HeaderParams,
    ) -> AnalysisResult<Self> {
        let time = Arc::new(Array1::from(time));
        let mut table = SignalTable::empty(time, header, ResolvedSchema::default());
        for (key, values) in columns {
            let series = SignalSeries::new(key, Arc::clone(&table.time), Array1::from(values))?;
            table.series.insert(key, series);
        }
        Ok(table)
    }

    fn empty(time: Arc<Array1<f64>>, header: HeaderParams, schema: ResolvedSchema) -> Self {
        let row_count = time.len();
        let duration_s = match (time.first(), time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };
        let sample_rate_hz = estimate_sample_rate(time.as_slice().unwrap_or(&[]))
            .or_else(|| header.sample_rate_hint())
            .unwrap_or(0.0);
        SignalTable {
            series: BTreeMap::new(),
            time,
            header,
            schema,
            sample_rate_hz,
            duration_s,
            row_count,
        }
    }

    pub fn time(&self) -> &Arc<Array1<f64>> {
        &self.time
    }

    pub fn header(&self) -> &HeaderParams {
        &self.header
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    pub fn contains(&self, key: &SignalKey) -> bool {
        self.series.contains_key(key)
    }

    pub fn get(&self, key: &SignalKey) -> AnalysisResult<&SignalSeries> {
        self.series.get(key).ok_or(AnalysisError::MissingSignal(*key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &SignalKey> {
        self.series.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalSeries> {
        self.series.values()
    }

    /// Adds a series after checking it shares this table's time base.
    pub fn insert(&mut self, series: SignalSeries) -> AnalysisResult<()> {
        if !Arc::ptr_eq(&series.time, &self.time) && series.time.as_ref() != self.time.as_ref() {
            return Err(AnalysisError::ShapeMismatch {
                context: "table time base",
                expected: self.time.len(),
                actual: series.time.len(),
            });
        }
        let mut series = series;
        series.time = Arc::clone(&self.time);
        self.series.insert(series.key, series);
        Ok(())
    }

    /// Uniform sample interval in seconds.
    pub fn sample_interval(&self) -> AnalysisResult<f64> {
        if self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0 {
            Ok(1.0 / self.sample_rate_hz)
        } else {
            Err(AnalysisError::InsufficientSamples { required: 2, available: self.row_count })
        }
    }

    /// Copy of this table resampled by linear interpolation onto a uniform
    /// grid with the same length and end points.
    pub fn equalized(&self) -> SignalTable {
        self.equalized_keys(self.series.keys())
    }

    /// Like [`equalized`](Self::equalized), but only the listed series are
    /// resampled and kept. Keys the table lacks are skipped.
    pub fn equalized_keys<'a>(&self, keys: impl IntoIterator<Item = &'a SignalKey>) -> SignalTable {
        let wanted: Vec<&SignalSeries> = keys.into_iter().filter_map(|key| self.series.get(key)).collect();
        let n = self.row_count;
        if n < 2 || self.duration_s <= 0.0 {
            let mut table = self.clone_metadata();
            for series in wanted {
                table.series.insert(series.key, series.clone());
            }
            return table;
        }
        let t0 = self.time[0];
        let step = self.duration_s / (n - 1) as f64;
        let grid = Arc::new(Array1::from_shape_fn(n, |k| t0 + k as f64 * step));

        let mut table = SignalTable {
            series: BTreeMap::new(),
            time: Arc::clone(&grid),
            header: self.header.clone(),
            schema: self.schema.clone(),
            sample_rate_hz: 1.0 / step,
            duration_s: self.duration_s,
            row_count: n,
        };
        for series in wanted {
            let values = interp_linear(&self.time, &series.values, &grid);
            table.series.insert(
                series.key,
                SignalSeries { key: series.key, time: Arc::clone(&grid), values },
            );
        }
        table
    }

    fn clone_metadata(&self) -> SignalTable {
        SignalTable {
            series: BTreeMap::new(),
            time: Arc::clone(&self.time),
            header: self.header.clone(),
            schema: self.schema.clone(),
            sample_rate_hz: self.sample_rate_hz,
            duration_s: self.duration_s,
            row_count: self.row_count,
        }
    }
}

/// Mean of the strictly positive timestamp deltas, as a rate in Hz.
pub fn estimate_sample_rate(time: &[f64]) -> Option<f64> {
    let (total, count) = time
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > MIN_TIME_DELTA_S)
        .fold((0.0, 0usize), |(sum, n), d| (sum + d, n + 1));
    if count == 0 {
        None
    } else {
        Some(count as f64 / total)
    }
}

/// Loads a decoded log, requiring only a time column.
pub fn load(raw_table: &RawTable, raw_header: &RawHeader) -> AnalysisResult<SignalTable> {
    load_with(raw_table, raw_header, &[])
}

/// Loads a decoded log and fails with a schema error if any signal needed by
/// `features` cannot be resolved.
pub fn load_with(raw_table: &RawTable, raw_header: &RawHeader, features: &[Feature]) -> AnalysisResult<SignalTable> {
    let header = HeaderParams::parse(raw_header);

    let all_columns = resolve_columns(&raw_table.columns);
    let time_column = all_columns
        .column(&SignalKey::Time)
        .and_then(|name| raw_table.column_index(name));
    let Some(time_idx) = time_column else {
        all_columns.require(features)?;
        return Err(AnalysisError::Schema(crate::error::SchemaError::new(vec![SignalKey::Time])));
    };
    let unit = all_columns.time_unit().unwrap_or(TimeUnit::Inferred);

    let (kept_rows, time) = normalize_time(raw_table, time_idx, unit);

    // Columns with no numeric value in any kept row count as absent.
    let populated: Vec<&str> = raw_table
        .columns
        .iter()
        .enumerate()
        .filter(|(idx, _)| {
            *idx == time_idx
                || kept_rows
                    .iter()
                    .any(|&r| raw_table.rows[r].get(*idx).copied().flatten().is_some_and(f64::is_finite))
        })
        .map(|(_, name)| name.as_str())
        .collect();
    let mut schema = resolve_columns(&populated);
    schema.require(features)?;

    let time = Arc::new(Array1::from(time));
    let mut table = SignalTable::empty(Arc::clone(&time), header, ResolvedSchema::default());

    let resolved: Vec<(SignalKey, String)> = schema
        .iter()
        .filter(|(key, _)| **key != SignalKey::Time)
        .map(|(key, column)| (*key, column.to_string()))
        .collect();
    for (key, column) in resolved {
        let Some(idx) = raw_table.column_index(&column) else {
            schema.remove(&key);
            continue;
        };
        let cells: Vec<Option<f64>> = kept_rows
            .iter()
            .map(|&r| raw_table.rows[r].get(idx).copied().flatten().filter(|v| v.is_finite()))
            .collect();
        match fill_gaps(&cells, time.as_slice().unwrap_or(&[])) {
            Some(values) => {
                table.series.insert(key, SignalSeries { key, time: Arc::clone(&time), values });
            }
            None => schema.remove(&key),
        }
    }
    table.schema = schema;

    if table.sample_rate_hz <= 0.0 {
        warn!("Could not determine sample rate (need >= 2 rows with distinct timestamps)");
    }
    info!(
        rows = table.row_count,
        signals = table.series.len(),
        sample_rate_hz = table.sample_rate_hz,
        duration_s = table.duration_s,
        "Loaded signal table"
    );
    Ok(table)
}

/// Returns the indices of rows kept and their timestamps in seconds from zero.
fn normalize_time(raw_table: &RawTable, time_idx: usize, unit: TimeUnit) -> (Vec<usize>, Vec<f64>) {
    let cell = |row: &Vec<Option<f64>>| row.get(time_idx).copied().flatten().filter(|v| v.is_finite());

    let scale = match unit {
        TimeUnit::Microseconds => 1e-6,
        TimeUnit::Milliseconds => 1e-3,
        TimeUnit::Seconds => 1.0,
        TimeUnit::Inferred => {
            let max = raw_table
                .rows
                .iter()
                .filter_map(cell)
                .fold(f64::NEG_INFINITY, f64::max);
            if max > TIME_MICROSECONDS_THRESHOLD {
                1e-6
            } else if max > TIME_MILLISECONDS_THRESHOLD {
                1e-3
            } else {
                1.0
            }
        }
    };

    let mut kept = Vec::with_capacity(raw_table.row_count());
    let mut time = Vec::with_capacity(raw_table.row_count());
    let mut missing = 0usize;
    let mut backwards = 0usize;
    for (row_idx, row) in raw_table.rows.iter().enumerate() {
        let Some(t) = cell(row).map(|v| v * scale) else {
            missing += 1;
            continue;
        };
        if time.last().is_some_and(|&last| t < last) {
            backwards += 1;
            continue;
        }
        kept.push(row_idx);
        time.push(t);
    }
    if missing > 0 {
        warn!(rows = missing, "Skipping rows with missing or invalid time");
    }
    if backwards > 0 {
        warn!(rows = backwards, "Dropping rows whose time goes backwards");
    }

    if let Some(&start) = time.first() {
        time.iter_mut().for_each(|t| *t -= start);
    }
    debug!(?unit, scale, rows = time.len(), "Normalised time column");
    (kept, time)
}

/// Interpolates interior gaps linearly in time; leading and trailing gaps
/// take the nearest value. `None` if the column has no values at all.
fn fill_gaps(cells: &[Option<f64>], time: &[f64]) -> Option<Array1<f64>> {
    let known: Vec<usize> = cells
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.map(|_| i))
        .collect();
    let (&first, &last) = (known.first()?, known.last()?);

    let mut out = Array1::zeros(cells.len());
    let mut next_known = 0usize;
    for i in 0..cells.len() {
        out[i] = match cells[i] {
            Some(v) => {
                next_known += 1;
                v
            }
            None if i < first => cells[first].unwrap_or_default(),
            None if i > last => cells[last].unwrap_or_default(),
            None => {
                let lo = known[next_known - 1];
                let hi = known[next_known];
                let (y0, y1) = (cells[lo].unwrap_or_default(), cells[hi].unwrap_or_default());
                let span = time[hi] - time[lo];
                if span > 0.0 {
                    y0 + (y1 - y0) * (time[i] - time[lo]) / span
                } else {
                    y0
                }
            }
        };
    }
    Some(out)
}

/// Linear interpolation of (xs, ys) at `grid`; xs must be non-decreasing.
fn interp_linear(xs: &Array1<f64>, ys: &Array1<f64>, grid: &Array1<f64>) -> Array1<f64> {
    let n = xs.len();
    let mut j = 0usize;
    grid.mapv(|x| {
        while j + 1 < n && xs[j + 1] < x {
            j += 1;
        }
        if j + 1 >= n || x <= xs[j] {
            return ys[j];
        }
        let span = xs[j + 1] - xs[j];
        if span > 0.0 {
            ys[j] + (ys[j + 1] - ys[j]) * (x - xs[j]) / span
        } else {
            ys[j + 1]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(columns: &[&str], rows: Vec<Vec<Option<f64>>>) -> RawTable {
        let mut table = RawTable::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row);
        }
        table
    }

    #[test]
    fn test_signal_key_display_and_parse() {
        let keys = [
            (SignalKey::gyro_raw(Axis::Roll), "gyro.raw.roll"),
            (SignalKey::gyro_filtered(Axis::Pitch), "gyro.filtered.pitch"),
            (SignalKey::Setpoint(Axis::Yaw), "setpoint.yaw"),
            (SignalKey::PidOutput(Axis::Roll), "pidOutput.roll"),
            (SignalKey::Motor(0), "motor.0"),
            (SignalKey::Throttle, "throttle"),
        ];
        for (key, text) in keys {
            assert_eq!(key.to_string(), text);
            assert_eq!(text.parse::<SignalKey>(), Ok(key));
        }
        assert!("gyro.warm.roll".parse::<SignalKey>().is_err());
    }

    #[test]
    fn test_load_normalises_microseconds() {
        let table = raw(
            &["time (us)", "gyroADC[0]"],
            vec![
                vec![Some(1_000_000.0), Some(1.0)],
                vec![Some(1_000_500.0), Some(2.0)],
                vec![Some(1_001_000.0), Some(3.0)],
            ],
        );
        let t = load(&table, &RawHeader::default()).unwrap();
        assert_eq!(t.row_count, 3);
        assert!((t.time()[1] - 0.0005).abs() < 1e-12);
        assert!((t.sample_rate_hz - 2000.0).abs() < 1e-6);
        assert!((t.duration_s - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_load_infers_milliseconds_without_suffix() {
        let table = raw(
            &["time", "gyroADC[0]"],
            vec![vec![Some(2000.0), Some(0.0)], vec![Some(2001.0), Some(0.0)]],
        );
        let t = load(&table, &RawHeader::default()).unwrap();
        assert!((t.time()[1] - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_load_drops_backwards_rows_and_fills_gaps() {
        let table = raw(
            &["time (s)", "setpoint[0]", "gyroADC[0]"],
            vec![
                vec![Some(0.0), Some(0.0), None],
                vec![Some(1.0), None, Some(5.0)],
                vec![Some(0.5), Some(99.0), Some(99.0)],
                vec![Some(2.0), Some(20.0), None],
            ],
        );
        let t = load(&table, &RawHeader::default()).unwrap();
        assert_eq!(t.row_count, 3);
        let sp = &t.get(&SignalKey::Setpoint(Axis::Roll)).unwrap().values;
        assert_eq!(sp.to_vec(), vec![0.0, 10.0, 20.0]);
        let gyro = &t.get(&SignalKey::gyro_filtered(Axis::Roll)).unwrap().values;
        assert_eq!(gyro.to_vec(), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_empty_column_is_absent() {
        let table = raw(
            &["time (s)", "gyroUnfilt[0]", "debug[0]"],
            vec![vec![Some(0.0), None, Some(1.0)], vec![Some(1.0), None, Some(2.0)]],
        );
        let t = load(&table, &RawHeader::default()).unwrap();
        let raw_roll = SignalKey::gyro_raw(Axis::Roll);
        assert_eq!(t.schema().column(&raw_roll), Some("debug[0]"));
        assert!(t.schema().used_legacy(&raw_roll));
    }

    #[test]
    fn test_load_with_reports_missing_features() {
        let table = raw(&["time (s)", "gyroADC[0]"], vec![vec![Some(0.0), Some(1.0)]]);
        let err = load_with(&table, &RawHeader::default(), &[Feature::Setpoint]).unwrap_err();
        match err {
            AnalysisError::Schema(schema) => assert_eq!(schema.missing.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_without_time_is_schema_error() {
        let table = raw(&["gyroADC[0]"], vec![vec![Some(1.0)]]);
        let err = load(&table, &RawHeader::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::Schema(s) if s.missing == vec![SignalKey::Time]));
    }

    #[test]
    fn test_all_series_share_time_base() {
        let table = raw(
            &["time (us)", "gyroADC[0]", "setpoint[0]", "motor[0]"],
            (0..10).map(|i| vec![Some(i as f64 * 125.0), Some(1.0), Some(2.0), Some(3.0)]).collect(),
        );
        let t = load(&table, &RawHeader::default()).unwrap();
        for series in t.iter() {
            assert_eq!(series.len(), t.row_count);
            assert!(Arc::ptr_eq(&series.time, t.time()));
        }
    }

    #[test]
    fn test_insert_rejects_foreign_time_base() {
        let mut t = SignalTable::from_columns(vec![0.0, 1.0, 2.0], vec![], HeaderParams::default()).unwrap();
        let foreign = SignalSeries::new(
            SignalKey::Throttle,
            Arc::new(Array1::from(vec![0.0, 1.0])),
            Array1::from(vec![1.0, 2.0]),
        )
        .unwrap();
        assert!(matches!(t.insert(foreign), Err(AnalysisError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_equalized_resamples_onto_uniform_grid() {
        let t = SignalTable::from_columns(
            vec![0.0, 1.0, 3.0, 4.0],
            vec![(SignalKey::Throttle, vec![0.0, 10.0, 30.0, 40.0])],
            HeaderParams::default(),
        )
        .unwrap();
        let eq = t.equalized();
        let grid: Vec<f64> = eq.time().to_vec();
        let expected = [0.0, 4.0 / 3.0, 8.0 / 3.0, 4.0];
        for (g, e) in grid.iter().zip(expected) {
            assert!((g - e).abs() < 1e-12);
        }
        let values = &eq.get(&SignalKey::Throttle).unwrap().values;
        assert!((values[1] - 40.0 / 3.0).abs() < 1e-9);
        assert!((eq.sample_rate_hz - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_equalized_keys_resamples_only_requested_series() {
        let t = SignalTable::from_columns(
            vec![0.0, 1.0, 3.0, 4.0],
            vec![
                (SignalKey::Throttle, vec![0.0, 10.0, 30.0, 40.0]),
                (SignalKey::Setpoint(Axis::Roll), vec![0.0, 1.0, 3.0, 4.0]),
                (SignalKey::Motor(0), vec![5.0; 4]),
            ],
            HeaderParams::default(),
        )
        .unwrap();
        let eq = t.equalized_keys(&[SignalKey::Setpoint(Axis::Roll), SignalKey::Setpoint(Axis::Yaw)]);
        assert_eq!(eq.keys().copied().collect::<Vec<_>>(), vec![SignalKey::Setpoint(Axis::Roll)]);
        let values = &eq.get(&SignalKey::Setpoint(Axis::Roll)).unwrap().values;
        assert!((values[1] - 4.0 / 3.0).abs() < 1e-9);
        assert!(Arc::ptr_eq(&eq.get(&SignalKey::Setpoint(Axis::Roll)).unwrap().time, eq.time()));
        assert_eq!(eq.row_count, 4);
    }
}
